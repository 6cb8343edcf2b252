use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw defect reported by the vision model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DopError {
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub description: String,
}

impl DopError {
    pub fn new(error_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            description: description.into(),
        }
    }

    fn from_value(value: &Value) -> anyhow::Result<Self> {
        let Some(row) = value.as_object() else {
            bail!("defect entry is not an object");
        };
        let error_type = required_str(row, "type")?;
        let description = optional_str(row, &["description"])?.unwrap_or_default();
        Ok(Self::new(error_type, description))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Retry,
    Skip,
    TryOnce,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Skip => "skip",
            Self::TryOnce => "try_once",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "retry" => Some(Self::Retry),
            "skip" => Some(Self::Skip),
            "try_once" => Some(Self::TryOnce),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub fixable: Vec<DopError>,
    pub unfixable: Vec<DopError>,
    pub decision: Decision,
}

impl ErrorClassification {
    pub fn summary(&self) -> String {
        format!(
            "{} fixable, {} unfixable defect(s)",
            self.fixable.len(),
            self.unfixable.len()
        )
    }
}

/// Parsed outcome of a vision continuity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionVerdict {
    pub is_valid: bool,
    pub errors: Vec<DopError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

impl VisionVerdict {
    /// Verdict used whenever the check cannot run or its answer is unusable.
    pub fn permissive() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            correction_prompt: None,
            decision: None,
        }
    }

    /// Strict decode of `{isValid, errors, correctionPrompt?}`.
    pub fn from_payload(payload: &Map<String, Value>) -> anyhow::Result<Self> {
        let is_valid = match payload.get("isValid").or_else(|| payload.get("is_valid")) {
            Some(Value::Bool(flag)) => *flag,
            Some(_) => bail!("isValid is not a boolean"),
            None => bail!("isValid is missing"),
        };
        let errors = match payload.get("errors") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(rows)) => rows
                .iter()
                .enumerate()
                .map(|(idx, row)| DopError::from_value(row).with_context(|| format!("errors[{idx}]")))
                .collect::<anyhow::Result<Vec<DopError>>>()?,
            Some(_) => bail!("errors is not an array"),
        };
        let correction_prompt = optional_str(payload, &["correctionPrompt", "correction_prompt"])?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        Ok(Self {
            is_valid,
            errors,
            correction_prompt,
            decision: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResult {
    pub action: Decision,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,
    pub confidence: f64,
}

pub const DEFAULT_MODEL_CONFIDENCE: f64 = 0.5;

impl DecisionResult {
    pub fn new(
        action: Decision,
        reason: impl Into<String>,
        enhanced_prompt: Option<String>,
        confidence: f64,
    ) -> Self {
        Self {
            action,
            reason: reason.into(),
            enhanced_prompt,
            confidence: clamp_confidence(confidence),
        }
    }

    /// Strict decode of a judge response. Missing fields take defaults
    /// (`try_once`, confidence 0.5); present fields of the wrong shape fail.
    pub fn from_payload(payload: &Map<String, Value>) -> anyhow::Result<Self> {
        let action = match optional_str(payload, &["action", "decision"])? {
            Some(raw) => Decision::parse(&raw)
                .with_context(|| format!("unknown action '{raw}'"))?,
            None => Decision::TryOnce,
        };
        let confidence = match payload.get("confidence") {
            None | Some(Value::Null) => DEFAULT_MODEL_CONFIDENCE,
            Some(Value::Number(number)) => number
                .as_f64()
                .context("confidence is not a finite number")?,
            Some(_) => bail!("confidence is not a number"),
        };
        let reason = optional_str(payload, &["reason"])?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "Judge model gave no reason.".to_string());
        let enhanced_prompt = optional_str(payload, &["enhancedPrompt", "enhanced_prompt"])?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        Ok(Self::new(action, reason, enhanced_prompt, confidence))
    }

    /// Original prompt with the additive fragment appended, for the caller's retry.
    pub fn augmented_prompt(&self, original_prompt: &str) -> String {
        let original = original_prompt.trim();
        match self.enhanced_prompt.as_deref() {
            Some(fragment) if !original.is_empty() => format!("{original}\n{fragment}"),
            Some(fragment) => fragment.to_string(),
            None => original.to_string(),
        }
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn required_str(row: &Map<String, Value>, key: &str) -> anyhow::Result<String> {
    match row.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(_) => bail!("{key} is not a string"),
        None => bail!("{key} is missing"),
    }
}

fn optional_str(row: &Map<String, Value>, keys: &[&str]) -> anyhow::Result<Option<String>> {
    for key in keys {
        match row.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(text)) => return Ok(Some(text.clone())),
            Some(_) => bail!("{key} is not a string"),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{Decision, DecisionResult, DopError, VisionVerdict};

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn verdict_decodes_model_schema() -> anyhow::Result<()> {
        let verdict = VisionVerdict::from_payload(&object(json!({
            "isValid": false,
            "errors": [{"type": "prop", "description": "Sword missing"}],
            "correctionPrompt": "  keep the sword in the right hand "
        })))?;
        assert!(!verdict.is_valid);
        assert_eq!(verdict.errors, vec![DopError::new("prop", "Sword missing")]);
        assert_eq!(
            verdict.correction_prompt.as_deref(),
            Some("keep the sword in the right hand")
        );
        assert_eq!(verdict.decision, None);
        Ok(())
    }

    #[test]
    fn verdict_rejects_wrong_shapes() {
        for payload in [
            json!({"errors": []}),
            json!({"isValid": "yes", "errors": []}),
            json!({"isValid": false, "errors": {"type": "prop"}}),
            json!({"isValid": false, "errors": [{"description": "no type"}]}),
            json!({"isValid": false, "errors": ["prop"]}),
            json!({"isValid": true, "correctionPrompt": 12}),
        ] {
            assert!(VisionVerdict::from_payload(&object(payload)).is_err());
        }
    }

    #[test]
    fn verdict_tolerates_missing_optional_fields() -> anyhow::Result<()> {
        let verdict = VisionVerdict::from_payload(&object(json!({"isValid": true})))?;
        assert_eq!(verdict, VisionVerdict::permissive());
        Ok(())
    }

    #[test]
    fn decision_defaults_missing_fields() -> anyhow::Result<()> {
        let result = DecisionResult::from_payload(&Map::new())?;
        assert_eq!(result.action, Decision::TryOnce);
        assert_eq!(result.confidence, 0.5);
        assert!(result.enhanced_prompt.is_none());
        Ok(())
    }

    #[test]
    fn decision_clamps_confidence_and_reads_prompt() -> anyhow::Result<()> {
        let result = DecisionResult::from_payload(&object(json!({
            "action": "RETRY",
            "confidence": 1.7,
            "reason": "prop missing",
            "enhancedPrompt": "the sword stays in her right hand"
        })))?;
        assert_eq!(result.action, Decision::Retry);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(
            result.augmented_prompt("Lan walks into the hall"),
            "Lan walks into the hall\nthe sword stays in her right hand"
        );
        Ok(())
    }

    #[test]
    fn decision_rejects_unknown_action_or_bad_confidence() {
        assert!(DecisionResult::from_payload(&object(json!({"action": "panic"}))).is_err());
        assert!(DecisionResult::from_payload(&object(json!({"confidence": "high"}))).is_err());
    }

    #[test]
    fn decision_serializes_wire_names() -> anyhow::Result<()> {
        let result = DecisionResult::new(Decision::TryOnce, "unsure", None, -0.2);
        let value = serde_json::to_value(&result)?;
        assert_eq!(value["action"], json!("try_once"));
        assert_eq!(value["confidence"], json!(0.0));
        assert!(value.get("enhancedPrompt").is_none());
        Ok(())
    }

    #[test]
    fn decision_parse_accepts_dashes() {
        assert_eq!(Decision::parse("try-once"), Some(Decision::TryOnce));
        assert_eq!(Decision::parse(" Skip "), Some(Decision::Skip));
        assert_eq!(Decision::parse(""), None);
    }
}
