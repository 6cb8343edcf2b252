use std::env;
use std::path::PathBuf;
use std::time::Duration;

use raccord_contracts::insights::Locale;

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub validator_model: Option<String>,
    pub judge_model: Option<String>,
    pub gemini_api_base: String,
    pub openai_api_base: String,
    pub request_timeout: Duration,
    pub max_image_dim: u32,
    pub locale: Locale,
    pub vocabulary_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validator_model: None,
            judge_model: None,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            request_timeout: Duration::from_secs(60),
            max_image_dim: 1024,
            locale: Locale::En,
            vocabulary_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| {
                lookup(key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        };

        let timeout_s = parse_clamped(first(&["RACCORD_REQUEST_TIMEOUT"]), 60.0, 5.0, 300.0);
        let max_image_dim =
            parse_clamped(first(&["RACCORD_MAX_IMAGE_DIM"]), 1024.0, 128.0, 4096.0).round() as u32;
        let vocabulary_path = first(&["RACCORD_VOCABULARY_PATH"])
            .map(PathBuf::from)
            .or_else(|| {
                first(&["HOME"]).map(|home| PathBuf::from(home).join(".raccord").join("vocabulary.json"))
            });

        Self {
            validator_model: first(&["RACCORD_VALIDATOR_MODEL"]),
            judge_model: first(&["RACCORD_JUDGE_MODEL"]),
            gemini_api_base: normalize_api_base(
                first(&["GEMINI_API_BASE"]),
                DEFAULT_GEMINI_API_BASE,
            ),
            openai_api_base: normalize_api_base(
                first(&["OPENAI_API_BASE", "OPENAI_BASE_URL"]),
                DEFAULT_OPENAI_API_BASE,
            ),
            request_timeout: Duration::from_secs_f64(timeout_s),
            max_image_dim,
            locale: first(&["RACCORD_LOCALE"])
                .and_then(|raw| Locale::parse(&raw))
                .unwrap_or_default(),
            vocabulary_path,
        }
    }
}

/// API key for the provider serving a call. Blank means "no credentials".
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &if self.is_present() { "<set>" } else { "<empty>" })
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Resolves the key for `provider` from the usual environment variables.
    pub fn from_env_for_provider(provider: &str) -> Self {
        let keys: &[&str] = match provider {
            "gemini" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            "openai" => &["OPENAI_API_KEY", "OPENAI_API_KEY_BACKUP"],
            "dryrun" => return Self::new("dryrun"),
            _ => &[],
        };
        keys.iter()
            .find_map(|key| env::var(key).ok().filter(|value| !value.trim().is_empty()))
            .map(Self::new)
            .unwrap_or_default()
    }
}

fn parse_clamped(raw: Option<String>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

fn normalize_api_base(raw: Option<String>, default: &str) -> String {
    raw.unwrap_or_else(|| default.to_string())
        .trim()
        .trim_end_matches('/')
        .to_string()
}
