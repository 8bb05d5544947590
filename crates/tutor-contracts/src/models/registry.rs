use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    /// Accepts inline image parts.
    pub vision: bool,
}

impl ModelSpec {
    pub fn new(name: &str, provider: &str, vision: bool) -> Self {
        Self {
            name: name.to_string(),
            provider: provider.to_string(),
            vision,
        }
    }
}

/// Known models in preference order. The first entry is the default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_specs([
            ModelSpec::new("gemini-flash-latest", "gemini", true),
            ModelSpec::new("gemini-2.5-flash", "gemini", true),
            ModelSpec::new("gemini-2.5-pro", "gemini", true),
            ModelSpec::new("gemini-2.0-flash-lite", "gemini", false),
            ModelSpec::new("dryrun-tutor-1", "dryrun", true),
        ])
    }
}

impl ModelRegistry {
    pub fn from_specs(specs: impl IntoIterator<Item = ModelSpec>) -> Self {
        Self {
            models: specs
                .into_iter()
                .map(|spec| (spec.name.clone(), spec))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn default_model(&self) -> Option<&ModelSpec> {
        self.models.first().map(|(_, spec)| spec)
    }
}
