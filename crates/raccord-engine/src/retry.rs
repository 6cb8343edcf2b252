use anyhow::{Context, Result};
use raccord_contracts::defects::{Decision, DecisionResult, DopError, ErrorClassification};
use raccord_contracts::models::CAPABILITY_RETRY_JUDGE;
use serde_json::{json, Value};

use crate::config::Credentials;
use crate::images::{usable, ImagePayload};
use crate::json::extract_json_object_from_text;
use crate::providers::{VisionPart, VisionPurpose};
use crate::ContinuityEngine;

pub const FAST_PATH_CONFIDENCE: f64 = 0.9;
pub const FALLBACK_CONFIDENCE: f64 = 0.7;

/// Decision that needs no model: unfixable defects, or nothing to fix.
pub fn fast_path_decision(classification: &ErrorClassification) -> Option<DecisionResult> {
    if classification.decision != Decision::Skip {
        return None;
    }
    let reason = if classification.unfixable.is_empty() {
        "No defects reported; nothing to retry.".to_string()
    } else {
        format!(
            "Unfixable defects ({}); re-prompting cannot repair them.",
            describe(&classification.unfixable)
        )
    };
    Some(DecisionResult::new(
        Decision::Skip,
        reason,
        None,
        FAST_PATH_CONFIDENCE,
    ))
}

/// Classification outcome used when the judge model is unavailable.
pub fn fallback_decision(classification: &ErrorClassification) -> DecisionResult {
    let enhanced_prompt = if classification.decision == Decision::Retry {
        fix_fragment(&classification.fixable)
    } else {
        None
    };
    DecisionResult::new(
        classification.decision,
        format!(
            "Judge model unavailable; decided from classification: {}.",
            classification.summary()
        ),
        enhanced_prompt,
        FALLBACK_CONFIDENCE,
    )
}

fn describe(errors: &[DopError]) -> String {
    errors
        .iter()
        .map(|error| {
            let description = error.description.trim();
            if description.is_empty() {
                error.error_type.clone()
            } else {
                format!("{}: {description}", error.error_type)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn fix_fragment(fixable: &[DopError]) -> Option<String> {
    let fixes: Vec<String> = fixable
        .iter()
        .map(|error| {
            let description = error.description.trim();
            if description.is_empty() {
                format!("correct the {}", error.error_type.trim())
            } else {
                description.to_string()
            }
        })
        .collect();
    if fixes.is_empty() {
        return None;
    }
    Some(format!("Continuity fixes: {}.", fixes.join("; ")))
}

pub(crate) fn judge_instruction(original_prompt: &str, errors: &[DopError]) -> String {
    let defect_lines: Vec<String> = errors
        .iter()
        .map(|error| format!("- [{}] {}", error.error_type, error.description.trim()))
        .collect();
    [
        "You are the retry judge for an AI film pipeline. Image A is the last accepted frame; Image B is the newly generated frame that failed continuity.".to_string(),
        String::new(),
        format!("Original generation prompt:\n{}", original_prompt.trim()),
        String::new(),
        "Reported defects:".to_string(),
        defect_lines.join("\n"),
        String::new(),
        "Decide whether regenerating with a better prompt is worth the cost:".to_string(),
        "- retry: the defects are prompt-fixable (props, lighting, placement, framing)".to_string(),
        "- try_once: borderline; one more attempt might land it".to_string(),
        "- skip: the defects cannot be fixed by prompting (identity or face drift)".to_string(),
        String::new(),
        "enhancedPrompt must be a short ADDITIVE fragment appended to the original prompt, never a rewrite of it. Leave it empty unless the action is retry or try_once.".to_string(),
        String::new(),
        "Respond with JSON only:".to_string(),
        r#"{"action": "retry|skip|try_once", "confidence": 0.0-1.0, "reason": "one sentence", "enhancedPrompt": "fragment"}"#.to_string(),
    ]
    .join("\n")
}

impl ContinuityEngine {
    /// Two-tier retry decision for a frame that failed continuity.
    ///
    /// Skip-worthy classifications return at once with no model call. Fixable
    /// defects go to the judge model when both frames and credentials are
    /// present; any judge failure falls back to the classification.
    pub fn make_retry_decision(
        &self,
        failed_image: Option<&ImagePayload>,
        reference_image: Option<&ImagePayload>,
        original_prompt: &str,
        errors: &[DopError],
        credentials: &Credentials,
    ) -> DecisionResult {
        let classification = self.classify_errors(errors);
        let base = json!({
            "fixable": classification.fixable.len(),
            "unfixable": classification.unfixable.len(),
        });

        if let Some(result) = fast_path_decision(&classification) {
            self.record_decision("fast", &base, &result, None);
            return result;
        }

        let (Some(failed), Some(reference)) = (usable(failed_image), usable(reference_image)) else {
            let result = fallback_decision(&classification);
            self.record_decision("fallback", &base, &result, Some("missing_image"));
            return result;
        };
        if !credentials.is_present() {
            let result = fallback_decision(&classification);
            self.record_decision("fallback", &base, &result, Some("missing_credentials"));
            return result;
        }

        match self.run_judge(failed, reference, original_prompt, errors, credentials) {
            Ok((result, model)) => {
                let mut payload = base.clone();
                if let Value::Object(map) = &mut payload {
                    map.insert("model".to_string(), Value::String(model));
                }
                self.record_decision("deep", &payload, &result, None);
                result
            }
            Err(err) => {
                let result = fallback_decision(&classification);
                let mut payload = decision_payload("fallback", &base, &result, Some("judge_failed"));
                if let Value::Object(map) = &mut payload {
                    map.insert(
                        "failed_image".to_string(),
                        Value::String(failed.fingerprint()),
                    );
                }
                self.record_failure("retry_decision", payload, &err, credentials);
                result
            }
        }
    }

    fn run_judge(
        &self,
        failed: &ImagePayload,
        reference: &ImagePayload,
        original_prompt: &str,
        errors: &[DopError],
        credentials: &Credentials,
    ) -> Result<(DecisionResult, String)> {
        let parts = vec![
            VisionPart::Text("Image A: last accepted frame (reference).".to_string()),
            VisionPart::Image(reference.clone()),
            VisionPart::Text("Image B: failed frame.".to_string()),
            VisionPart::Image(failed.clone()),
            VisionPart::Text(judge_instruction(original_prompt, errors)),
        ];
        let answer = self.call_model(
            CAPABILITY_RETRY_JUDGE,
            VisionPurpose::RetryJudge,
            parts,
            credentials,
        )?;
        let payload = extract_json_object_from_text(&answer.text).with_context(|| {
            format!("{} answer from {} had no JSON object", answer.model, answer.provider)
        })?;
        let result = DecisionResult::from_payload(&payload).context("judge answer has the wrong shape")?;
        Ok((result, answer.model))
    }

    fn record_decision(
        &self,
        path: &str,
        base: &Value,
        result: &DecisionResult,
        fallback_reason: Option<&str>,
    ) {
        self.record(
            "retry_decision",
            decision_payload(path, base, result, fallback_reason),
        );
    }
}

fn decision_payload(
    path: &str,
    base: &Value,
    result: &DecisionResult,
    fallback_reason: Option<&str>,
) -> Value {
    let mut payload = base.clone();
    if let Value::Object(map) = &mut payload {
        map.insert("path".to_string(), Value::String(path.to_string()));
        map.insert(
            "action".to_string(),
            Value::String(result.action.as_str().to_string()),
        );
        map.insert("confidence".to_string(), json!(result.confidence));
        if let Some(reason) = fallback_reason {
            map.insert("fallback_reason".to_string(), Value::String(reason.to_string()));
        }
    }
    payload
}
