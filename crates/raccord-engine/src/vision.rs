use anyhow::{Context, Result};
use raccord_contracts::defects::VisionVerdict;
use raccord_contracts::models::CAPABILITY_RACCORD_CHECK;
use raccord_contracts::scene::{CharacterStyle, ProjectSnapshot, Scene};
use serde_json::json;

use crate::classifier::classify_errors;
use crate::config::Credentials;
use crate::images::{usable, ImagePayload};
use crate::json::extract_json_object_from_text;
use crate::providers::{VisionPart, VisionPurpose};
use crate::ContinuityEngine;

/// A scene and its predecessor, read from one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ScenePair<'a> {
    pub project: &'a ProjectSnapshot,
    pub previous: &'a Scene,
    pub current: &'a Scene,
}

impl<'a> ScenePair<'a> {
    pub fn for_scene(project: &'a ProjectSnapshot, scene_id: &str) -> Option<Self> {
        let (previous, current) = project.adjacent_pair(scene_id)?;
        Some(Self {
            project,
            previous,
            current,
        })
    }

    pub fn same_location(&self) -> bool {
        self.previous.group_id == self.current.group_id
    }
}

impl ContinuityEngine {
    /// Compares the current frame against the previous one with a vision model.
    ///
    /// Fails open: missing frames, missing credentials, transport errors and
    /// unparseable answers all yield a permissive verdict, never an error.
    pub fn validate_raccord_with_vision(
        &self,
        current_image: Option<&ImagePayload>,
        previous_image: Option<&ImagePayload>,
        pair: &ScenePair<'_>,
        credentials: &Credentials,
        style: CharacterStyle,
    ) -> VisionVerdict {
        let base = json!({
            "scene_id": pair.current.id,
            "previous_scene_id": pair.previous.id,
        });
        let (Some(current), Some(previous)) = (usable(current_image), usable(previous_image)) else {
            self.record(
                "vision_validation_skipped",
                with_fields(&base, json!({ "reason": "missing_image" })),
            );
            return VisionVerdict::permissive();
        };
        let frames = json!({
            "previous_image": previous.fingerprint(),
            "current_image": current.fingerprint(),
        });
        if !credentials.is_present() {
            self.record(
                "vision_validation_skipped",
                with_fields(&with_fields(&base, frames), json!({ "reason": "missing_credentials" })),
            );
            return VisionVerdict::permissive();
        }

        match self.run_vision_check(current, previous, pair, credentials, style) {
            Ok((verdict, model)) => {
                self.record(
                    "vision_validation_finished",
                    with_fields(
                        &with_fields(&base, frames),
                        json!({
                            "model": model,
                            "is_valid": verdict.is_valid,
                            "errors": verdict.errors,
                            "decision": verdict.decision,
                        }),
                    ),
                );
                verdict
            }
            Err(err) => {
                self.record_failure(
                    "vision_validation_failed_open",
                    with_fields(&base, frames),
                    &err,
                    credentials,
                );
                VisionVerdict::permissive()
            }
        }
    }

    fn run_vision_check(
        &self,
        current: &ImagePayload,
        previous: &ImagePayload,
        pair: &ScenePair<'_>,
        credentials: &Credentials,
        style: CharacterStyle,
    ) -> Result<(VisionVerdict, String)> {
        let parts = vec![
            VisionPart::Text("Image A: the PREVIOUS scene (reference).".to_string()),
            VisionPart::Image(previous.clone()),
            VisionPart::Text("Image B: the CURRENT scene (to check).".to_string()),
            VisionPart::Image(current.clone()),
            VisionPart::Text(raccord_instruction(pair, style)),
        ];
        let answer = self.call_model(
            CAPABILITY_RACCORD_CHECK,
            VisionPurpose::RaccordCheck,
            parts,
            credentials,
        )?;
        let payload = extract_json_object_from_text(&answer.text).with_context(|| {
            format!("{} answer from {} had no JSON object", answer.model, answer.provider)
        })?;
        let mut verdict =
            VisionVerdict::from_payload(&payload).context("vision verdict has the wrong shape")?;
        verdict.decision = Some(classify_errors(&verdict.errors, self.vocabulary()).decision);
        Ok((verdict, answer.model))
    }
}

fn with_fields(base: &serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    let mut merged = base.clone();
    if let (Some(target), serde_json::Value::Object(fields)) = (merged.as_object_mut(), extra) {
        target.extend(fields);
    }
    merged
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

pub(crate) fn raccord_instruction(pair: &ScenePair<'_>, style: CharacterStyle) -> String {
    let project = pair.project;
    let expected_characters = project.character_names(&pair.current.character_ids);
    let expected_props = project.product_names(&pair.current.product_ids);
    let previous_props = project.product_names(&pair.previous.product_ids);

    let mut lines = vec![
        "You are a continuity supervisor (script supervisor) checking raccord between two consecutive film frames.".to_string(),
        String::new(),
        format!("Previous scene: {}", pair.previous.context_description.trim()),
        format!("Current scene: {}", pair.current.context_description.trim()),
        format!("Characters expected in the current scene: {}", list_or_none(&expected_characters)),
        format!("Props expected in the current scene: {}", list_or_none(&expected_props)),
        format!("Props present in the previous scene: {}", list_or_none(&previous_props)),
        String::new(),
    ];

    if pair.same_location() {
        let location = project
            .group_name(pair.current.group_id.as_deref())
            .unwrap_or("the same set");
        lines.extend([
            format!("LOCATION: both frames are in the same location ({location}). Be strict:"),
            "- walls, furniture, set dressing and background layout must match Image A".to_string(),
            "- a background that changed to a different place is a spatial error".to_string(),
        ]);
    } else {
        lines.extend([
            "LOCATION: the current scene moved to a new location.".to_string(),
            "- a different background is expected here and is not an error".to_string(),
        ]);
    }

    if style.requires_mannequin() {
        lines.extend([
            String::new(),
            "CHARACTER STYLE: every character must be a faceless stylized mannequin.".to_string(),
            "- any realistic human face or skin detail is an identity error".to_string(),
        ]);
    }

    lines.extend([
        String::new(),
        "RULES:".to_string(),
        "1. Props: each expected prop must be visible and sit where the scene implies; a prop that vanished or appeared without cause is a prop error.".to_string(),
        "2. Characters: a change of face, identity, hair or costume is CRITICAL; report it as type identity or face.".to_string(),
        "3. Lighting: be lenient. Only a day/night contradiction is a lighting error; mood or exposure shifts are fine.".to_string(),
        "4. Spatial scale: if the current description implies a different framing or space (for example an interior close-up) but the background still shows the previous wide exterior, that is CRITICAL; report it as type spatial.".to_string(),
        "5. Static background: if the description implies motion or travel but the background is pixel-identical to Image A, report type static_background.".to_string(),
        "6. Left/right placement of characters or props that flipped without a cut motivation is a position error.".to_string(),
        String::new(),
        "Respond with JSON only, no prose:".to_string(),
        r#"{"isValid": true|false, "errors": [{"type": "prop|lighting|spatial|position|identity|face|costume|static_background", "description": "what is wrong"}], "correctionPrompt": "short prompt fragment that would fix the frame"}"#.to_string(),
        "Use an empty errors array and isValid true when continuity holds.".to_string(),
    ]);
    lines.join("\n")
}
