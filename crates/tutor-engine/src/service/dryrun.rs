use tutor_contracts::turns::{ImageAttachment, RequestHistoryEntry, Role};

use super::{ChatHandle, CompletionService, ModelOptions};
use crate::error::ServiceError;

pub struct DryrunService;

impl CompletionService for DryrunService {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(
        &self,
        options: &ModelOptions,
        text: &str,
        image: &ImageAttachment,
    ) -> Result<String, ServiceError> {
        let digest = image.sha256_hex();
        Ok(format!(
            "[{}] Looking at your {} image ({} bytes, sha256 {}). Hint for \"{}\": start by naming every quantity shown.",
            options.model,
            image.mime_type,
            image.len(),
            &digest[..12],
            text.trim()
        ))
    }

    fn start_chat<'a>(
        &'a self,
        options: &ModelOptions,
        history: Vec<RequestHistoryEntry>,
    ) -> Box<dyn ChatHandle + 'a> {
        Box::new(DryrunChat {
            model: options.model.clone(),
            history,
        })
    }
}

struct DryrunChat {
    model: String,
    history: Vec<RequestHistoryEntry>,
}

impl ChatHandle for DryrunChat {
    fn history(&self) -> &[RequestHistoryEntry] {
        &self.history
    }

    fn send(&mut self, text: &str) -> Result<String, ServiceError> {
        let reply = format!(
            "[{}] {} earlier turn(s) in view. Hint for \"{}\": which formula links the quantities you know?",
            self.model,
            self.history.len(),
            text.trim()
        );
        self.history.push(RequestHistoryEntry::new(Role::User, text));
        self.history
            .push(RequestHistoryEntry::new(Role::Model, reply.clone()));
        Ok(reply)
    }
}
