use super::registry::{ModelRegistry, ModelSpec};

/// Model picked for one call, and why it differs from the request if it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Honors `requested` when it serves `capability`; otherwise takes the
    /// registry's first capable model and records the substitution.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|name| !name.is_empty());
        if let Some(model) = requested.and_then(|name| self.registry.lookup(name, capability)) {
            return Ok(ModelSelection {
                model: model.clone(),
                requested: requested.map(str::to_string),
                fallback_reason: None,
            });
        }

        let Some(model) = self.registry.capable_of(capability).next() else {
            return Err(format!("No models available for capability '{capability}'."));
        };
        Ok(ModelSelection {
            model: model.clone(),
            requested: requested.map(str::to_string),
            fallback_reason: requested.map(|name| {
                format!("Requested model '{name}' unavailable for capability '{capability}'.")
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ModelSelector;
    use crate::models::{ModelRegistry, ModelSpec, CAPABILITY_RACCORD_CHECK, CAPABILITY_RETRY_JUDGE};

    fn check_only(names: &[&str]) -> ModelSelector {
        ModelSelector::new(ModelRegistry::from_specs(
            names
                .iter()
                .map(|name| ModelSpec::new(name, "dryrun", &[CAPABILITY_RACCORD_CHECK], 256)),
        ))
    }

    #[test]
    fn falls_back_when_requested_model_unavailable() {
        let selection = check_only(&["vision-fallback"])
            .select(Some("missing"), CAPABILITY_RACCORD_CHECK)
            .unwrap();
        assert_eq!(selection.model.name, "vision-fallback");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'raccord_check'.")
        );
    }

    #[test]
    fn requested_model_wrong_capability_also_falls_back() {
        let selection = ModelSelector::default()
            .select(Some("gpt-4o"), CAPABILITY_RACCORD_CHECK)
            .unwrap();
        assert_eq!(selection.model.name, "gemini-2.5-flash");
        assert!(selection.fallback_reason.is_some());
    }

    #[test]
    fn no_request_uses_default_silently() {
        for requested in [None, Some("  ")] {
            let selection = ModelSelector::default()
                .select(requested, CAPABILITY_RACCORD_CHECK)
                .unwrap();
            assert_eq!(selection.model.name, "gemini-2.5-flash");
            assert!(selection.requested.is_none());
            assert!(selection.fallback_reason.is_none());
        }
    }

    #[test]
    fn honors_a_capable_request() {
        let selection = ModelSelector::default()
            .select(Some("gpt-4o"), CAPABILITY_RETRY_JUDGE)
            .unwrap();
        assert_eq!(selection.model.provider, "openai");
        assert!(selection.fallback_reason.is_none());
    }

    #[test]
    fn errors_when_no_models_for_capability() {
        let err = check_only(&["only-check"])
            .select(Some("only-check"), CAPABILITY_RETRY_JUDGE)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'retry_judge'.");
    }
}
