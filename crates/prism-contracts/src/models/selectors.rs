use super::registry::{ModelKind, ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_default(),
        }
    }

    /// Resolves a caller hint against the registry.
    ///
    /// Ids the registry has never heard of pass through untouched (without a
    /// cache hint); only a registered model of the wrong kind is replaced by
    /// `default`.
    pub fn select(
        &self,
        requested: Option<&str>,
        default: &str,
        kind: ModelKind,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = match requested {
            Some(requested_value) => {
                if let Some(model) = self.registry.ensure(requested_value, kind) {
                    return Ok(ModelSelection {
                        model,
                        requested: Some(requested_value.to_string()),
                        fallback_reason: None,
                    });
                }
                if self.registry.get(requested_value).is_none() {
                    return Ok(ModelSelection {
                        model: ModelSpec::unregistered(requested_value, kind),
                        requested: Some(requested_value.to_string()),
                        fallback_reason: None,
                    });
                }
                format!(
                    "Requested model '{requested_value}' unavailable for kind '{}'.",
                    kind.as_str()
                )
            }
            None => "No model specified; using default.".to_string(),
        };

        let model = self.resolve_default(default, kind)?;
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }

    fn resolve_default(&self, default: &str, kind: ModelKind) -> Result<ModelSpec, String> {
        if let Some(model) = self.registry.ensure(default, kind) {
            return Ok(model);
        }
        if self.registry.get(default).is_none() && !default.trim().is_empty() {
            return Ok(ModelSpec::unregistered(default.trim(), kind));
        }
        self.registry
            .by_kind(kind)
            .into_iter()
            .next()
            .ok_or_else(|| format!("No models available for kind '{}'.", kind.as_str()))
    }
}
