use indexmap::IndexMap;

pub const CAPABILITY_RACCORD_CHECK: &str = "raccord_check";
pub const CAPABILITY_RETRY_JUDGE: &str = "retry_judge";

const BOTH: &[&str] = &[CAPABILITY_RACCORD_CHECK, CAPABILITY_RETRY_JUDGE];

/// Built-in vision models as `(name, provider, capabilities, max_output_tokens)`,
/// most preferred first.
const DEFAULT_VISION_MODELS: &[(&str, &str, &[&str], u64)] = &[
    ("gemini-2.5-flash", "gemini", BOTH, 2048),
    ("gemini-2.5-pro", "gemini", BOTH, 4096),
    ("gpt-4o-mini", "openai", BOTH, 1200),
    ("gpt-4o", "openai", &[CAPABILITY_RETRY_JUDGE], 1600),
    ("dryrun-vision-1", "dryrun", BOTH, 512),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    /// Output budget requested from the provider for one call.
    pub max_output_tokens: u64,
}

impl ModelSpec {
    pub fn new(name: &str, provider: &str, capabilities: &[&str], max_output_tokens: u64) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            capabilities: capabilities.iter().map(|item| item.to_string()).collect(),
            max_output_tokens,
        }
    }

    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Vision models the engine knows how to call, in preference order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_specs(
            DEFAULT_VISION_MODELS
                .iter()
                .map(|(name, provider, capabilities, tokens)| {
                    ModelSpec::new(name, provider, capabilities, *tokens)
                }),
        )
    }
}

impl ModelRegistry {
    /// Later specs with an already-seen name replace the earlier entry in place.
    pub fn from_specs(specs: impl IntoIterator<Item = ModelSpec>) -> Self {
        let mut models = IndexMap::new();
        for spec in specs {
            models.insert(spec.name.clone(), spec);
        }
        Self { models }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn capable_of<'a>(&'a self, capability: &'a str) -> impl Iterator<Item = &'a ModelSpec> + 'a {
        self.models
            .values()
            .filter(move |model| model.supports(capability))
    }

    /// The named model, only if it serves `capability`.
    pub fn lookup(&self, name: &str, capability: &str) -> Option<&ModelSpec> {
        self.get(name.trim()).filter(|model| model.supports(capability))
    }
}
