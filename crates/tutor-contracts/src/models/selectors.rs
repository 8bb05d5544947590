use anyhow::bail;

use super::registry::{ModelRegistry, ModelSpec};

/// Providers that accept model names the registry does not list, matched
/// by name prefix.
const PASSTHROUGH_PREFIXES: &[(&str, &str)] = &[("gemini", "gemini")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: String,
    pub provider: String,
    pub vision: bool,
    /// Set when the request was not an exact registry match.
    pub note: Option<String>,
}

impl ModelSelection {
    fn listed(spec: &ModelSpec, note: Option<String>) -> Self {
        Self {
            model: spec.name.clone(),
            provider: spec.provider.clone(),
            vision: spec.vision,
            note,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    /// Resolution order: exact registry entry, provider passthrough for an
    /// unlisted name with a known prefix, then the registry default.
    pub fn select(&self, requested: &str) -> anyhow::Result<ModelSelection> {
        let requested = requested.trim();
        if let Some(spec) = self.registry.get(requested) {
            return Ok(ModelSelection::listed(spec, None));
        }

        if !requested.is_empty() {
            if let Some((_, provider)) = PASSTHROUGH_PREFIXES
                .iter()
                .find(|(prefix, _)| requested.starts_with(prefix))
            {
                return Ok(ModelSelection {
                    model: requested.to_string(),
                    provider: (*provider).to_string(),
                    vision: true,
                    note: Some(format!(
                        "Model '{requested}' is not listed; sending it to {provider} as-is."
                    )),
                });
            }
        }

        let Some(default) = self.registry.default_model() else {
            bail!("no models registered");
        };
        let note = if requested.is_empty() {
            "No model specified; using default.".to_string()
        } else {
            format!("Model '{requested}' is not listed; using {}.", default.name)
        };
        Ok(ModelSelection::listed(default, Some(note)))
    }
}
