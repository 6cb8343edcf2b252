use serde::{Deserialize, Serialize};

use crate::vocabulary::PostureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Prop,
    Environment,
    Character,
    Flow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Vi,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en_us" | "english" => Some(Self::En),
            "vi" | "vi-vn" | "vi_vn" | "vietnamese" => Some(Self::Vi),
            _ => None,
        }
    }
}

/// Structured form of an insight; `message`/`suggestion` are rendered from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightKind {
    SameLocation {
        location: Option<String>,
    },
    LocationTransition {
        from: Option<String>,
        to: Option<String>,
    },
    PropsDisappeared {
        names: Vec<String>,
    },
    PropJump {
        names: Vec<String>,
    },
    CharactersLeft {
        names: Vec<String>,
    },
    PostureChange {
        from: PostureState,
        to: PostureState,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedText {
    pub message: String,
    pub suggestion: Option<String>,
}

impl InsightKind {
    pub fn insight_type(&self) -> InsightType {
        match self {
            Self::SameLocation { .. } => InsightType::Environment,
            Self::LocationTransition { .. } | Self::PostureChange { .. } => InsightType::Flow,
            Self::PropsDisappeared { .. } | Self::PropJump { .. } => InsightType::Prop,
            Self::CharactersLeft { .. } => InsightType::Character,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::PropsDisappeared { .. } => Severity::Warning,
            Self::PropJump { .. } => Severity::Critical,
            _ => Severity::Info,
        }
    }

    pub fn render(&self, locale: Locale) -> RenderedText {
        match locale {
            Locale::En => self.render_en(),
            Locale::Vi => self.render_vi(),
        }
    }

    fn render_en(&self) -> RenderedText {
        match self {
            Self::SameLocation { location } => RenderedText {
                message: format!(
                    "Same location ({}): background details must stay identical to the previous scene.",
                    location.as_deref().unwrap_or("unnamed")
                ),
                suggestion: None,
            },
            Self::LocationTransition { from, to } => RenderedText {
                message: format!(
                    "Location transition: {} -> {}.",
                    from.as_deref().unwrap_or("unknown location"),
                    to.as_deref().unwrap_or("unknown location")
                ),
                suggestion: None,
            },
            Self::PropsDisappeared { names } => RenderedText {
                message: format!(
                    "Props disappeared since the previous scene: {}.",
                    names.join(", ")
                ),
                suggestion: Some(
                    "Add them back if the character should still be holding them.".to_string(),
                ),
            },
            Self::PropJump { names } => RenderedText {
                message: format!(
                    "Prop jump: {} appear without being picked up in the previous scene.",
                    names.join(", ")
                ),
                suggestion: Some(
                    "Describe the pickup in the previous scene or remove the props here."
                        .to_string(),
                ),
            },
            Self::CharactersLeft { names } => RenderedText {
                message: format!("Left the frame: {}.", names.join(", ")),
                suggestion: None,
            },
            Self::PostureChange { from, to } => RenderedText {
                message: format!(
                    "Physical state changes from {} to {}.",
                    posture_en(*from),
                    posture_en(*to)
                ),
                suggestion: Some(
                    "Describe the transition action explicitly in this scene.".to_string(),
                ),
            },
        }
    }

    fn render_vi(&self) -> RenderedText {
        match self {
            Self::SameLocation { location } => RenderedText {
                message: format!(
                    "Cùng bối cảnh ({}): chi tiết phông nền phải giữ nguyên như cảnh trước.",
                    location.as_deref().unwrap_or("chưa đặt tên")
                ),
                suggestion: None,
            },
            Self::LocationTransition { from, to } => RenderedText {
                message: format!(
                    "Chuyển bối cảnh: {} -> {}.",
                    from.as_deref().unwrap_or("không rõ"),
                    to.as_deref().unwrap_or("không rõ")
                ),
                suggestion: None,
            },
            Self::PropsDisappeared { names } => RenderedText {
                message: format!("Đạo cụ biến mất so với cảnh trước: {}.", names.join(", ")),
                suggestion: Some(
                    "Thêm lại nếu nhân vật vẫn đang cầm chúng.".to_string(),
                ),
            },
            Self::PropJump { names } => RenderedText {
                message: format!(
                    "Nhảy đạo cụ: {} xuất hiện mà cảnh trước không có hành động nhặt/lấy.",
                    names.join(", ")
                ),
                suggestion: Some(
                    "Mô tả hành động nhặt ở cảnh trước hoặc bỏ đạo cụ khỏi cảnh này.".to_string(),
                ),
            },
            Self::CharactersLeft { names } => RenderedText {
                message: format!("Rời khỏi khung hình: {}.", names.join(", ")),
                suggestion: None,
            },
            Self::PostureChange { from, to } => RenderedText {
                message: format!(
                    "Trạng thái thay đổi từ {} sang {}.",
                    posture_vi(*from),
                    posture_vi(*to)
                ),
                suggestion: Some("Mô tả rõ hành động chuyển tiếp trong cảnh này.".to_string()),
            },
        }
    }
}

fn posture_en(state: PostureState) -> &'static str {
    match state {
        PostureState::Sit => "sitting",
        PostureState::Stand => "standing",
        PostureState::Lie => "lying",
        PostureState::Run => "running",
        PostureState::Walk => "walking",
    }
}

fn posture_vi(state: PostureState) -> &'static str {
    match state {
        PostureState::Sit => "ngồi",
        PostureState::Stand => "đứng",
        PostureState::Lie => "nằm",
        PostureState::Run => "chạy",
        PostureState::Walk => "đi bộ",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuityInsight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_ids: Vec<String>,
    pub detail: InsightKind,
}

impl ContinuityInsight {
    pub fn new(detail: InsightKind, affected_ids: Vec<String>, locale: Locale) -> Self {
        let rendered = detail.render(locale);
        Self {
            insight_type: detail.insight_type(),
            severity: detail.severity(),
            message: rendered.message,
            suggestion: rendered.suggestion,
            affected_ids,
            detail,
        }
    }

    pub fn localized(&self, locale: Locale) -> Self {
        Self::new(self.detail.clone(), self.affected_ids.clone(), locale)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{ContinuityInsight, InsightKind, InsightType, Locale, Severity};
    use crate::vocabulary::PostureState;

    #[test]
    fn kind_drives_type_and_severity() {
        let jump = ContinuityInsight::new(
            InsightKind::PropJump {
                names: vec!["Key".to_string()],
            },
            vec!["p-key".to_string()],
            Locale::En,
        );
        assert_eq!(jump.insight_type, InsightType::Prop);
        assert_eq!(jump.severity, Severity::Critical);
        assert!(jump.message.contains("Key"));

        let posture = ContinuityInsight::new(
            InsightKind::PostureChange {
                from: PostureState::Stand,
                to: PostureState::Sit,
            },
            Vec::new(),
            Locale::En,
        );
        assert_eq!(posture.insight_type, InsightType::Flow);
        assert_eq!(posture.severity, Severity::Info);
        assert!(posture.suggestion.is_some());
    }

    #[test]
    fn serializes_with_editor_field_names() -> anyhow::Result<()> {
        let insight = ContinuityInsight::new(
            InsightKind::PropsDisappeared {
                names: vec!["Sword".to_string()],
            },
            vec!["p-sword".to_string()],
            Locale::En,
        );
        let value = serde_json::to_value(&insight)?;
        assert_eq!(value["type"], json!("prop"));
        assert_eq!(value["severity"], json!("warning"));
        assert_eq!(value["affectedIds"], json!(["p-sword"]));
        assert_eq!(value["detail"]["kind"], json!("props_disappeared"));

        let decoded: ContinuityInsight = serde_json::from_value(value)?;
        assert_eq!(decoded, insight);
        Ok(())
    }

    #[test]
    fn empty_affected_ids_are_omitted() -> anyhow::Result<()> {
        let insight = ContinuityInsight::new(
            InsightKind::SameLocation { location: None },
            Vec::new(),
            Locale::En,
        );
        let value = serde_json::to_value(&insight)?;
        assert_eq!(value.get("affectedIds"), None::<&Value>);
        assert_eq!(value["type"], json!("environment"));
        Ok(())
    }

    #[test]
    fn localized_rerenders_without_changing_structure() {
        let insight = ContinuityInsight::new(
            InsightKind::LocationTransition {
                from: Some("Street".to_string()),
                to: Some("Cafe".to_string()),
            },
            Vec::new(),
            Locale::En,
        );
        let vi = insight.localized(Locale::Vi);
        assert_eq!(vi.detail, insight.detail);
        assert_eq!(vi.severity, insight.severity);
        assert!(vi.message.starts_with("Chuyển bối cảnh"));
        assert!(vi.message.contains("Street -> Cafe"));
    }

    #[test]
    fn locale_parse_accepts_common_spellings() {
        assert_eq!(Locale::parse("EN"), Some(Locale::En));
        assert_eq!(Locale::parse("vi-VN"), Some(Locale::Vi));
        assert_eq!(Locale::parse("fr"), None);
    }
}
