use std::path::Path;

use anyhow::{bail, Context};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_VOCABULARY_JSON: &str = include_str!("../resources/default_vocabulary.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureState {
    Sit,
    Stand,
    Lie,
    Run,
    Walk,
}

impl PostureState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sit => "sit",
            Self::Stand => "stand",
            Self::Lie => "lie",
            Self::Run => "run",
            Self::Walk => "walk",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "sit" => Some(Self::Sit),
            "stand" => Some(Self::Stand),
            "lie" => Some(Self::Lie),
            "run" => Some(Self::Run),
            "walk" => Some(Self::Walk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordCategory {
    /// Verb in a scene description that explains a prop appearing next scene.
    PickupVerb,
    Posture(PostureState),
    /// Defect description term that marks an identity/face mismatch.
    UnfixableDescription,
    /// Substring of a defect `type` that marks it as identity-related.
    IdentityTypeMarker,
    /// Defect `type` that re-prompting can always fix.
    FixableType,
}

impl KeywordCategory {
    pub fn label(self) -> String {
        match self {
            Self::PickupVerb => "pickup_verb".to_string(),
            Self::Posture(state) => format!("posture:{}", state.as_str()),
            Self::UnfixableDescription => "unfixable_description".to_string(),
            Self::IdentityTypeMarker => "identity_type_marker".to_string(),
            Self::FixableType => "fixable_type".to_string(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if let Some(state) = normalized.strip_prefix("posture:") {
            return PostureState::parse(state).map(Self::Posture);
        }
        match normalized.as_str() {
            "pickup_verb" => Some(Self::PickupVerb),
            "unfixable_description" => Some(Self::UnfixableDescription),
            "identity_type_marker" => Some(Self::IdentityTypeMarker),
            "fixable_type" => Some(Self::FixableType),
            _ => None,
        }
    }
}

/// Keyword table driving every free-text match in the engine.
///
/// Keywords are stored lowercased, in insertion order. One keyword may
/// carry several categories (`face` is both a description term and a
/// type marker).
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    table: IndexMap<String, Vec<KeywordCategory>>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let mut vocabulary = Self::empty();
        if let Err(err) = vocabulary.merge_json(DEFAULT_VOCABULARY_JSON) {
            panic!("embedded vocabulary is invalid: {err:#}");
        }
        vocabulary
    }
}

impl Vocabulary {
    pub fn empty() -> Self {
        Self {
            table: IndexMap::new(),
        }
    }

    /// Default table with the override file merged on top when it exists.
    pub fn load(override_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut vocabulary = Self::default();
        let Some(path) = override_path else {
            return Ok(vocabulary);
        };
        if !path.exists() {
            return Ok(vocabulary);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading vocabulary {}", path.display()))?;
        vocabulary
            .merge_json(&raw)
            .with_context(|| format!("invalid vocabulary {}", path.display()))?;
        Ok(vocabulary)
    }

    /// Merges `{"keyword": "category" | ["category", ...] | null}`.
    ///
    /// Existing keywords take the new categories, `null` removes a keyword.
    pub fn merge_json(&mut self, raw: &str) -> anyhow::Result<()> {
        let payload: Value = serde_json::from_str(raw)?;
        let Some(rows) = payload.as_object() else {
            bail!("vocabulary must be a JSON object");
        };
        for (keyword, value) in rows {
            let categories = match value {
                Value::Null => {
                    self.remove(keyword);
                    continue;
                }
                Value::String(label) => vec![parse_category(keyword, label)?],
                Value::Array(labels) => {
                    let mut categories = Vec::new();
                    for label in labels {
                        let Some(label) = label.as_str() else {
                            bail!("keyword '{keyword}' has a non-string category");
                        };
                        categories.push(parse_category(keyword, label)?);
                    }
                    categories
                }
                _ => bail!("keyword '{keyword}' must map to a category"),
            };
            self.table.insert(normalize(keyword), categories);
        }
        Ok(())
    }

    pub fn insert(&mut self, keyword: &str, category: KeywordCategory) {
        let entry = self.table.entry(normalize(keyword)).or_default();
        if !entry.contains(&category) {
            entry.push(category);
        }
    }

    pub fn remove(&mut self, keyword: &str) {
        self.table.shift_remove(&normalize(keyword));
    }

    pub fn keywords(&self, category: KeywordCategory) -> Vec<&str> {
        self.table
            .iter()
            .filter(|(_, categories)| categories.contains(&category))
            .map(|(keyword, _)| keyword.as_str())
            .collect()
    }

    pub fn is_fixable_type(&self, error_type: &str) -> bool {
        let normalized = normalize(error_type);
        self.table
            .get(&normalized)
            .map(|categories| categories.contains(&KeywordCategory::FixableType))
            .unwrap_or(false)
    }

    pub fn has_identity_marker(&self, error_type: &str) -> bool {
        self.contains_keyword(error_type, KeywordCategory::IdentityTypeMarker)
    }

    pub fn has_unfixable_term(&self, description: &str) -> bool {
        self.contains_keyword(description, KeywordCategory::UnfixableDescription)
    }

    pub fn mentions_pickup(&self, text: &str) -> bool {
        self.contains_keyword(text, KeywordCategory::PickupVerb)
    }

    /// Posture named earliest in `text`; on a tie the longer keyword wins.
    pub fn posture_of(&self, text: &str) -> Option<(PostureState, &str)> {
        let haystack = text.to_lowercase();
        let mut best: Option<(usize, usize, PostureState, &str)> = None;
        for (keyword, categories) in &self.table {
            let Some(state) = categories.iter().find_map(|category| match category {
                KeywordCategory::Posture(state) => Some(*state),
                _ => None,
            }) else {
                continue;
            };
            let Some(position) = find_word(&haystack, keyword) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_pos, best_len, _, _)) => {
                    position < best_pos || (position == best_pos && keyword.len() > best_len)
                }
            };
            if better {
                best = Some((position, keyword.len(), state, keyword.as_str()));
            }
        }
        best.map(|(_, _, state, keyword)| (state, keyword))
    }

    fn contains_keyword(&self, text: &str, category: KeywordCategory) -> bool {
        let haystack = text.to_lowercase();
        self.table.iter().any(|(keyword, categories)| {
            categories.contains(&category) && haystack.contains(keyword.as_str())
        })
    }
}

fn parse_category(keyword: &str, label: &str) -> anyhow::Result<KeywordCategory> {
    KeywordCategory::parse(label)
        .with_context(|| format!("keyword '{keyword}' has unknown category '{label}'"))
}

fn normalize(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// First occurrence of `word` not glued to a letter or digit on either side.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    haystack.match_indices(word).map(|(position, _)| position).find(|&position| {
        let before = haystack[..position].chars().next_back();
        let after = haystack[position + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::{KeywordCategory, PostureState, Vocabulary};

    #[test]
    fn default_table_carries_shipped_keyword_sets() {
        let vocabulary = Vocabulary::default();
        assert_eq!(
            vocabulary.keywords(KeywordCategory::PickupVerb),
            vec!["nhặt", "lấy", "cầm", "pick up", "take", "grab", "receive"]
        );
        assert_eq!(
            vocabulary.keywords(KeywordCategory::FixableType),
            vec!["prop", "lighting", "spatial", "position"]
        );
        assert_eq!(
            vocabulary.keywords(KeywordCategory::IdentityTypeMarker),
            vec!["face", "identity"]
        );
        assert!(vocabulary
            .keywords(KeywordCategory::UnfixableDescription)
            .contains(&"different person"));
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let vocabulary = Vocabulary::default();
        assert!(vocabulary.mentions_pickup("She will PICK UP the key"));
        assert!(vocabulary.mentions_pickup("Anh ấy Nhặt thanh kiếm"));
        assert!(!vocabulary.mentions_pickup("He stares at the door"));
        assert!(vocabulary.has_unfixable_term("Looks like a Different Person"));
        assert!(vocabulary.has_identity_marker("character_identity"));
        assert!(vocabulary.has_identity_marker("FACE"));
        assert!(!vocabulary.has_identity_marker("prop"));
    }

    #[test]
    fn fixable_types_match_exactly() {
        let vocabulary = Vocabulary::default();
        assert!(vocabulary.is_fixable_type(" Lighting "));
        assert!(!vocabulary.is_fixable_type("prop_color"));
    }

    #[test]
    fn posture_prefers_earliest_keyword() {
        let vocabulary = Vocabulary::default();
        assert_eq!(
            vocabulary.posture_of("Lan is standing, then sitting"),
            Some((PostureState::Stand, "standing"))
        );
        assert_eq!(
            vocabulary.posture_of("Minh ngồi bên cửa sổ"),
            Some((PostureState::Sit, "ngồi"))
        );
        assert_eq!(vocabulary.posture_of("Nobody moves"), None);
    }

    #[test]
    fn posture_verbs_match_whole_words_only() {
        let vocabulary = Vocabulary::default();
        assert_eq!(
            vocabulary.posture_of("Lan sat down, then stood"),
            Some((PostureState::Sit, "sat"))
        );
        assert_eq!(
            vocabulary.posture_of("Minh ran to the gate"),
            Some((PostureState::Run, "ran"))
        );
        assert_eq!(vocabulary.posture_of("A satin curtain in the grand hall"), None);
        assert_eq!(vocabulary.posture_of("The players visit"), None);
    }

    #[test]
    fn merge_overrides_appends_and_removes() -> anyhow::Result<()> {
        let mut vocabulary = Vocabulary::default();
        vocabulary.merge_json(
            r#"{"catch": "pickup_verb", "take": null, "Kneeling": "posture:sit"}"#,
        )?;
        assert!(vocabulary.mentions_pickup("catch the ball"));
        assert!(!vocabulary.mentions_pickup("take a breath"));
        assert_eq!(
            vocabulary.posture_of("kneeling by the fire"),
            Some((PostureState::Sit, "kneeling"))
        );
        Ok(())
    }

    #[test]
    fn merge_rejects_unknown_categories() {
        let mut vocabulary = Vocabulary::empty();
        assert!(vocabulary.merge_json(r#"{"x": "mystery"}"#).is_err());
        assert!(vocabulary.merge_json(r#"{"x": "posture:fly"}"#).is_err());
        assert!(vocabulary.merge_json(r#"["x"]"#).is_err());
    }

    #[test]
    fn load_merges_override_file_and_ignores_missing_one() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("vocabulary.json");
        assert_eq!(Vocabulary::load(Some(&path))?, Vocabulary::default());

        std::fs::write(&path, r#"{"swap": "unfixable_description"}"#)?;
        let vocabulary = Vocabulary::load(Some(&path))?;
        assert!(vocabulary.has_unfixable_term("face swap detected"));
        assert!(vocabulary.has_unfixable_term("swap"));

        std::fs::write(&path, "not json")?;
        assert!(Vocabulary::load(Some(&path)).is_err());
        Ok(())
    }

    #[test]
    fn insert_and_category_labels_round_trip() {
        let mut vocabulary = Vocabulary::empty();
        vocabulary.insert("Seize", KeywordCategory::PickupVerb);
        assert!(vocabulary.mentions_pickup("they seize it"));
        for category in [
            KeywordCategory::PickupVerb,
            KeywordCategory::Posture(PostureState::Walk),
            KeywordCategory::UnfixableDescription,
            KeywordCategory::IdentityTypeMarker,
            KeywordCategory::FixableType,
        ] {
            assert_eq!(KeywordCategory::parse(&category.label()), Some(category));
        }
    }
}
