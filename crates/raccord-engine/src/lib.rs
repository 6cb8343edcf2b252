pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod images;
pub mod json;
pub mod providers;
pub mod retry;
pub mod shots;
pub mod vision;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use rand::Rng;
use raccord_contracts::defects::{DopError, ErrorClassification};
use raccord_contracts::events::{EventPayload, EventWriter};
use raccord_contracts::insights::{ContinuityInsight, Severity};
use raccord_contracts::models::{ModelRegistry, ModelSelector, CAPABILITY_RETRY_JUDGE};
use raccord_contracts::reports::ContinuityReport;
use raccord_contracts::scene::ProjectSnapshot;
use raccord_contracts::vocabulary::Vocabulary;
use serde_json::{json, Value};
use uuid::Uuid;

pub use config::{Credentials, EngineConfig};
pub use images::ImagePayload;
pub use providers::{VisionPart, VisionProvider, VisionProviderRegistry, VisionPurpose, VisionRequest};
pub use shots::{ShotSuggestion, ShotType};
pub use vision::ScenePair;

use images::usable;
use providers::{default_provider_registry, error_chain_text, truncate_text};

pub fn new_session_id() -> String {
    format!("raccord-{}", Uuid::new_v4())
}

/// Continuity and retry-decision engine for one editing session.
///
/// Holds no per-scene state: every call reads the snapshot it is given, so
/// one engine can serve concurrent checks from several threads.
pub struct ContinuityEngine {
    config: EngineConfig,
    vocabulary: Vocabulary,
    model_selector: ModelSelector,
    providers: VisionProviderRegistry,
    events: EventWriter,
}

pub(crate) struct ModelAnswer {
    pub text: String,
    pub model: String,
    pub provider: String,
}

impl ContinuityEngine {
    pub fn new(config: EngineConfig, events: EventWriter) -> Result<Self> {
        let vocabulary = Vocabulary::load(config.vocabulary_path.as_deref())
            .context("failed loading keyword vocabulary")?;
        let providers = default_provider_registry(&config.gemini_api_base, &config.openai_api_base);
        let engine = Self {
            config,
            vocabulary,
            model_selector: ModelSelector::default(),
            providers,
            events,
        };
        engine.record(
            "engine_started",
            json!({
                "locale": engine.config.locale,
                "validator_model": engine.config.validator_model,
                "judge_model": engine.config.judge_model,
                "providers": engine.providers.names(),
            }),
        );
        Ok(engine)
    }

    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_model_registry(mut self, registry: ModelRegistry) -> Self {
        self.model_selector = ModelSelector::new(registry);
        self
    }

    /// Registers a provider, replacing any existing one with the same name.
    pub fn register_provider<P: VisionProvider + 'static>(&mut self, provider: P) {
        self.providers.register(provider);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn event_writer(&self) -> EventWriter {
        self.events.clone()
    }

    /// Provider that would serve `capability` under the current configuration.
    pub fn provider_for(&self, capability: &str) -> Option<String> {
        self.model_selector
            .select(self.requested_model(capability), capability)
            .ok()
            .map(|selection| selection.model.provider)
    }

    fn requested_model(&self, capability: &str) -> Option<&str> {
        if capability == CAPABILITY_RETRY_JUDGE {
            self.config.judge_model.as_deref()
        } else {
            self.config.validator_model.as_deref()
        }
    }

    pub fn analyze_raccord(&self, project: &ProjectSnapshot, scene_id: &str) -> Vec<ContinuityInsight> {
        let insights =
            analyzer::analyze_raccord(project, scene_id, &self.vocabulary, self.config.locale);
        let count_of = |severity: Severity| {
            insights
                .iter()
                .filter(|insight| insight.severity == severity)
                .count()
        };
        self.record(
            "raccord_analyzed",
            json!({
                "scene_id": scene_id,
                "insights": insights.len(),
                "critical": count_of(Severity::Critical),
                "warning": count_of(Severity::Warning),
            }),
        );
        insights
    }

    pub fn classify_errors(&self, errors: &[DopError]) -> ErrorClassification {
        classifier::classify_errors(errors, &self.vocabulary)
    }

    pub fn suggest_next_shot<R: Rng + ?Sized>(
        &self,
        project: &ProjectSnapshot,
        last_scene_id: &str,
        rng: &mut R,
    ) -> Option<ShotSuggestion> {
        shots::suggest_next_shot(project, last_scene_id, rng)
    }

    /// Symbolic analysis first; the vision check only when both frames exist.
    pub fn check_scene(
        &self,
        project: &ProjectSnapshot,
        scene_id: &str,
        previous_image: Option<&ImagePayload>,
        current_image: Option<&ImagePayload>,
        credentials: &Credentials,
    ) -> ContinuityReport {
        let insights = self.analyze_raccord(project, scene_id);
        let pair = ScenePair::for_scene(project, scene_id);
        let vision = match (&pair, usable(previous_image), usable(current_image)) {
            (Some(pair), Some(previous), Some(current)) => Some(self.validate_raccord_with_vision(
                Some(current),
                Some(previous),
                pair,
                credentials,
                project.character_style,
            )),
            _ => None,
        };
        ContinuityReport {
            scene_id: scene_id.to_string(),
            previous_scene_id: pair.map(|pair| pair.previous.id.clone()),
            insights,
            vision,
        }
    }

    pub(crate) fn call_model(
        &self,
        capability: &str,
        purpose: VisionPurpose,
        parts: Vec<VisionPart>,
        credentials: &Credentials,
    ) -> Result<ModelAnswer> {
        let selection = self
            .model_selector
            .select(self.requested_model(capability), capability)
            .map_err(anyhow::Error::msg)?;
        if let Some(reason) = selection.fallback_reason.as_deref() {
            self.record(
                "model_fallback",
                json!({
                    "capability": capability,
                    "requested": selection.requested,
                    "model": selection.model.name,
                    "reason": reason,
                }),
            );
        }
        let provider_name = selection.model.provider.clone();
        let provider = self
            .providers
            .get(&provider_name)
            .with_context(|| format!("no vision provider registered as '{provider_name}'"))?;
        let request = VisionRequest {
            model: selection.model.name.clone(),
            parts,
            api_key: credentials.api_key().to_string(),
            purpose,
            max_output_tokens: selection.model.max_output_tokens,
            timeout: self.config.request_timeout,
        };
        let text = provider
            .complete(&request)
            .with_context(|| format!("{} call to {provider_name} failed", purpose.as_str()))?;
        Ok(ModelAnswer {
            text,
            model: selection.model.name,
            provider: provider_name,
        })
    }

    /// Journal writes never fail the caller.
    pub(crate) fn record(&self, event_type: &str, payload: Value) {
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = EventPayload::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        let _ = self.events.emit(event_type, payload);
    }

    /// Attaches the error chain with the caller's API key masked out.
    pub(crate) fn record_failure(
        &self,
        event_type: &str,
        mut payload: Value,
        err: &anyhow::Error,
        credentials: &Credentials,
    ) {
        let mut text = error_chain_text(err, usize::MAX);
        if credentials.is_present() {
            text = text.replace(credentials.api_key(), "<redacted>");
        }
        if let Value::Object(map) = &mut payload {
            map.insert("error".to_string(), Value::String(truncate_text(&text, 512)));
        }
        self.record(event_type, payload);
    }
}
