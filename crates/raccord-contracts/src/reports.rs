use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defects::VisionVerdict;
use crate::events::now_utc_iso;
use crate::insights::{ContinuityInsight, Severity};

/// Result of one continuity check on a scene and its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuityReport {
    pub scene_id: String,
    pub previous_scene_id: Option<String>,
    pub insights: Vec<ContinuityInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision: Option<VisionVerdict>,
}

impl ContinuityReport {
    pub fn highest_severity(&self) -> Option<Severity> {
        self.insights.iter().map(|insight| insight.severity).max()
    }

    /// True when neither the symbolic nor the visual check flagged a blocker.
    pub fn is_clean(&self) -> bool {
        let symbolic_ok = self.highest_severity() != Some(Severity::Critical);
        let visual_ok = self
            .vision
            .as_ref()
            .map(|verdict| verdict.is_valid)
            .unwrap_or(true);
        symbolic_ok && visual_ok
    }
}

pub fn write_report(path: &Path, report: &ContinuityReport) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(report)? {
        Value::Object(map) => map,
        _ => anyhow::bail!("continuity report did not serialize to an object"),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{write_report, ContinuityReport};
    use crate::defects::{DopError, VisionVerdict};
    use crate::insights::{ContinuityInsight, InsightKind, Locale, Severity};

    fn report() -> ContinuityReport {
        ContinuityReport {
            scene_id: "s5".to_string(),
            previous_scene_id: Some("s4".to_string()),
            insights: vec![
                ContinuityInsight::new(
                    InsightKind::SameLocation {
                        location: Some("Hall".to_string()),
                    },
                    Vec::new(),
                    Locale::En,
                ),
                ContinuityInsight::new(
                    InsightKind::PropsDisappeared {
                        names: vec!["Sword".to_string()],
                    },
                    vec!["p-sword".to_string()],
                    Locale::En,
                ),
            ],
            vision: None,
        }
    }

    #[test]
    fn severity_and_cleanliness_follow_findings() {
        let mut report = report();
        assert_eq!(report.highest_severity(), Some(Severity::Warning));
        assert!(report.is_clean());

        report.vision = Some(VisionVerdict {
            is_valid: false,
            errors: vec![DopError::new("prop", "Sword missing")],
            correction_prompt: None,
            decision: None,
        });
        assert!(!report.is_clean());
    }

    #[test]
    fn write_report_generates_expected_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("reports").join("s5.json");
        write_report(&path, &report())?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed["sceneId"], json!("s5"));
        assert_eq!(parsed["previousSceneId"], json!("s4"));
        assert_eq!(parsed["insights"][1]["affectedIds"], json!(["p-sword"]));
        assert!(parsed.get("vision").is_none());
        assert!(parsed.get("ts").and_then(Value::as_str).is_some());
        Ok(())
    }
}
