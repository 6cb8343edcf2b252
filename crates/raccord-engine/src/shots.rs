use rand::Rng;
use raccord_contracts::scene::ProjectSnapshot;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    CloseUp,
    Wide,
    Pov,
    OverTheShoulder,
    Reaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotSuggestion {
    pub shot: ShotType,
    pub title: &'static str,
    pub prompt_hint: &'static str,
}

impl ShotType {
    pub fn suggestion(self) -> ShotSuggestion {
        let (title, prompt_hint) = match self {
            Self::CloseUp => (
                "Close-up",
                "Tight close-up on the character's face to land the emotion.",
            ),
            Self::Wide => (
                "Wide shot",
                "Wide establishing shot showing the whole location and everyone's position.",
            ),
            Self::Pov => (
                "POV",
                "Point-of-view shot through the character's eyes, looking at what they hold.",
            ),
            Self::OverTheShoulder => (
                "Over-the-shoulder",
                "Over-the-shoulder medium shot framing the other side of the exchange.",
            ),
            Self::Reaction => (
                "Reaction shot",
                "Medium reaction shot of the listener responding to the previous beat.",
            ),
        };
        ShotSuggestion {
            shot: self,
            title,
            prompt_hint,
        }
    }
}

const WIDE_MARKERS: &[&str] = &["wide", "establishing", "toàn cảnh", "long shot"];

pub(crate) fn is_wide_angle(camera_angle: Option<&str>) -> bool {
    let Some(angle) = camera_angle else {
        return false;
    };
    let lowered = angle.to_lowercase();
    WIDE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

const CLOSE_MARKERS: &[&str] = &["close-up", "close up", "closeup", "cận cảnh", "đặc tả"];

pub(crate) fn is_close_angle(camera_angle: Option<&str>) -> bool {
    let Some(angle) = camera_angle else {
        return false;
    };
    let lowered = angle.to_lowercase();
    CLOSE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Heuristic next framing after `last_scene_id`; `None` for an unknown scene.
pub fn suggest_next_shot<R: Rng + ?Sized>(
    project: &ProjectSnapshot,
    last_scene_id: &str,
    rng: &mut R,
) -> Option<ShotSuggestion> {
    let scene = project.scene(last_scene_id)?;
    let shot = if is_wide_angle(scene.camera_angle.as_deref()) {
        pick(rng, &[ShotType::CloseUp, ShotType::Pov])
    } else if !scene.product_ids.is_empty() {
        ShotType::Pov
    } else if is_close_angle(scene.camera_angle.as_deref()) {
        // Pull back after a tight shot.
        ShotType::Wide
    } else {
        pick(rng, &[ShotType::OverTheShoulder, ShotType::Reaction])
    };
    Some(shot.suggestion())
}

fn pick<R: Rng + ?Sized>(rng: &mut R, options: &[ShotType; 2]) -> ShotType {
    options[rng.gen_range(0..options.len())]
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use raccord_contracts::scene::{ProjectSnapshot, Scene};

    use super::{is_close_angle, is_wide_angle, suggest_next_shot, ShotType};

    fn project(camera_angle: Option<&str>, props: &[&str]) -> ProjectSnapshot {
        ProjectSnapshot {
            scenes: vec![Scene {
                id: "last".to_string(),
                camera_angle: camera_angle.map(str::to_string),
                product_ids: props.iter().map(|value| value.to_string()).collect(),
                ..Scene::default()
            }],
            ..ProjectSnapshot::default()
        }
    }

    #[test]
    fn unknown_scene_has_no_suggestion() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(suggest_next_shot(&project(None, &[]), "other", &mut rng).is_none());
    }

    #[test]
    fn wide_angle_moves_in_to_close_up_or_pov() {
        let project = project(Some("Wide establishing"), &["p-sword"]);
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = Vec::new();
        for _ in 0..64 {
            let shot = suggest_next_shot(&project, "last", &mut rng).unwrap().shot;
            assert!(matches!(shot, ShotType::CloseUp | ShotType::Pov));
            if !seen.contains(&shot) {
                seen.push(shot);
            }
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn props_suggest_pov() {
        let mut rng = StdRng::seed_from_u64(3);
        let suggestion = suggest_next_shot(&project(Some("medium"), &["p-lamp"]), "last", &mut rng).unwrap();
        assert_eq!(suggestion.shot, ShotType::Pov);
        assert_eq!(suggestion.title, "POV");
    }

    #[test]
    fn close_up_without_props_pulls_back_to_wide() {
        let mut rng = StdRng::seed_from_u64(5);
        for angle in ["Close-up on Lan", "cận cảnh"] {
            let suggestion = suggest_next_shot(&project(Some(angle), &[]), "last", &mut rng).unwrap();
            assert_eq!(suggestion.shot, ShotType::Wide);
            assert_eq!(suggestion.title, "Wide shot");
        }
        let with_prop = suggest_next_shot(&project(Some("close-up"), &["p-sword"]), "last", &mut rng).unwrap();
        assert_eq!(with_prop.shot, ShotType::Pov);
    }

    #[test]
    fn otherwise_picks_a_mid_range_shot() {
        let project = project(None, &[]);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..32 {
            let shot = suggest_next_shot(&project, "last", &mut rng).unwrap().shot;
            assert!(matches!(shot, ShotType::OverTheShoulder | ShotType::Reaction));
        }
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let project = project(None, &[]);
        let run = |seed: u64| -> Vec<ShotType> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..16)
                .filter_map(|_| suggest_next_shot(&project, "last", &mut rng))
                .map(|suggestion| suggestion.shot)
                .collect()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn wide_markers_cover_both_languages() {
        assert!(is_wide_angle(Some("TOÀN CẢNH")));
        assert!(is_wide_angle(Some("long shot")));
        assert!(!is_wide_angle(Some("close-up")));
        assert!(!is_wide_angle(None));
        assert!(is_close_angle(Some("Extreme CLOSEUP")));
        assert!(!is_close_angle(Some("wide")));
    }
}
