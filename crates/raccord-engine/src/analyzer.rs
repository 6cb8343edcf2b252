use raccord_contracts::insights::{ContinuityInsight, InsightKind, Locale};
use raccord_contracts::scene::{ProjectSnapshot, Scene};
use raccord_contracts::vocabulary::Vocabulary;

/// Symbolic continuity check of a scene against the one right before it.
///
/// Returns nothing for the first scene or an unknown id. Insights come out
/// in check order: location, props, characters, physical state.
pub fn analyze_raccord(
    project: &ProjectSnapshot,
    scene_id: &str,
    vocabulary: &Vocabulary,
    locale: Locale,
) -> Vec<ContinuityInsight> {
    let Some((previous, current)) = project.adjacent_pair(scene_id) else {
        return Vec::new();
    };

    let mut insights = Vec::new();
    location_continuity(project, previous, current, locale, &mut insights);
    prop_continuity(project, previous, current, vocabulary, locale, &mut insights);
    character_continuity(project, previous, current, locale, &mut insights);
    physical_state_continuity(previous, current, vocabulary, locale, &mut insights);
    insights
}

fn location_continuity(
    project: &ProjectSnapshot,
    previous: &Scene,
    current: &Scene,
    locale: Locale,
    insights: &mut Vec<ContinuityInsight>,
) {
    if previous.group_id == current.group_id {
        insights.push(ContinuityInsight::new(
            InsightKind::SameLocation {
                location: project
                    .group_name(current.group_id.as_deref())
                    .map(str::to_string),
            },
            current.group_id.iter().cloned().collect(),
            locale,
        ));
        return;
    }
    let affected = previous
        .group_id
        .iter()
        .chain(current.group_id.iter())
        .cloned()
        .collect();
    insights.push(ContinuityInsight::new(
        InsightKind::LocationTransition {
            from: project
                .group_name(previous.group_id.as_deref())
                .map(str::to_string),
            to: project
                .group_name(current.group_id.as_deref())
                .map(str::to_string),
        },
        affected,
        locale,
    ));
}

fn prop_continuity(
    project: &ProjectSnapshot,
    previous: &Scene,
    current: &Scene,
    vocabulary: &Vocabulary,
    locale: Locale,
    insights: &mut Vec<ContinuityInsight>,
) {
    let disappeared = difference(&previous.product_ids, &current.product_ids);
    if !disappeared.is_empty() {
        insights.push(ContinuityInsight::new(
            InsightKind::PropsDisappeared {
                names: project.product_names(&disappeared),
            },
            disappeared,
            locale,
        ));
    }

    let appeared = difference(&current.product_ids, &previous.product_ids);
    if !appeared.is_empty() && !vocabulary.mentions_pickup(&previous.context_description) {
        insights.push(ContinuityInsight::new(
            InsightKind::PropJump {
                names: project.product_names(&appeared),
            },
            appeared,
            locale,
        ));
    }
}

fn character_continuity(
    project: &ProjectSnapshot,
    previous: &Scene,
    current: &Scene,
    locale: Locale,
    insights: &mut Vec<ContinuityInsight>,
) {
    // Only exits are reported; an arrival needs no warning.
    let left = difference(&previous.character_ids, &current.character_ids);
    if left.is_empty() {
        return;
    }
    insights.push(ContinuityInsight::new(
        InsightKind::CharactersLeft {
            names: project.character_names(&left),
        },
        left,
        locale,
    ));
}

fn physical_state_continuity(
    previous: &Scene,
    current: &Scene,
    vocabulary: &Vocabulary,
    locale: Locale,
    insights: &mut Vec<ContinuityInsight>,
) {
    let Some((from, _)) = vocabulary.posture_of(&previous.context_description) else {
        return;
    };
    let Some((to, _)) = vocabulary.posture_of(&current.context_description) else {
        return;
    };
    if from == to {
        return;
    }
    insights.push(ContinuityInsight::new(
        InsightKind::PostureChange { from, to },
        Vec::new(),
        locale,
    ));
}

/// Ids in `left` but not in `right`, deduplicated, in `left` order.
fn difference(left: &[String], right: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in left {
        if !right.contains(id) && !out.contains(id) {
            out.push(id.clone());
        }
    }
    out
}
