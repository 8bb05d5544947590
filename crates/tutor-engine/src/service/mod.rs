mod dryrun;
mod gemini;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tutor_contracts::turns::{ImageAttachment, RequestHistoryEntry};

use crate::config::TutorConfig;
use crate::error::ServiceError;

pub use dryrun::DryrunService;
pub use gemini::GeminiService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOptions {
    pub model: String,
    pub system_instruction: String,
}

/// A hosted model that turns prompts into assistant text.
///
/// Two call shapes are consumed: a stateless single-shot multimodal
/// `generate`, and a multi-turn chat seeded with text-only history.
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    fn generate(
        &self,
        options: &ModelOptions,
        text: &str,
        image: &ImageAttachment,
    ) -> Result<String, ServiceError>;

    fn start_chat<'a>(
        &'a self,
        options: &ModelOptions,
        history: Vec<RequestHistoryEntry>,
    ) -> Box<dyn ChatHandle + 'a>;
}

pub trait ChatHandle {
    /// Wire history the next `send` is seeded with.
    fn history(&self) -> &[RequestHistoryEntry];

    /// Sends `text` as the live user turn. On success the live turn and the
    /// reply are folded into the handle's history; on failure it is untouched.
    fn send(&mut self, text: &str) -> Result<String, ServiceError>;
}

#[derive(Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Arc<dyn CompletionService>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S: CompletionService + 'static>(&mut self, service: S) {
        self.services
            .insert(service.name().to_string(), Arc::new(service));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CompletionService>> {
        self.services.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

pub fn default_service_registry(config: &TutorConfig) -> Result<ServiceRegistry> {
    let mut registry = ServiceRegistry::new();
    registry.register(DryrunService);
    registry.register(GeminiService::new(config)?);
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_includes_gemini_and_dryrun() -> anyhow::Result<()> {
        let registry = default_service_registry(&TutorConfig::default())?;
        assert_eq!(registry.names(), vec!["dryrun", "gemini"]);
        assert!(registry.get("gemini").is_some());
        assert!(registry.get("openai").is_none());
        Ok(())
    }
}
