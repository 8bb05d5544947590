use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
pub use tutor_contracts::events::DispatchPath;
use tutor_contracts::events::SessionEvent;
use tutor_contracts::turns::{project_history, ImageAttachment, RequestHistoryEntry, Turn};

use crate::error::{DispatchError, ServiceError};
use crate::service::{CompletionService, ModelOptions};
use crate::session::ChatSession;
use crate::upload::PendingUpload;

/// Draws the session transcript. Called with the full snapshot every time.
pub trait RenderAdapter {
    fn render(&mut self, turns: &[Turn]);
}

pub struct NoopRenderer;

impl RenderAdapter for NoopRenderer {
    fn render(&mut self, _turns: &[Turn]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    text: String,
    image: Option<ImageAttachment>,
}

impl Submission {
    pub fn new(text: impl Into<String>, image: Option<ImageAttachment>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self { text, image })
    }

    /// Blank text leaves the upload staged.
    pub fn from_pending(text: impl Into<String>, pending: &mut PendingUpload) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Self::new(text, pending.take())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub path: DispatchPath,
    /// Projection of the store including the new user turn. `None` on the
    /// image path.
    pub projected_history: Option<Vec<RequestHistoryEntry>>,
    pub reply: String,
}

pub struct TurnDispatcher {
    service: Arc<dyn CompletionService>,
    options: ModelOptions,
}

impl TurnDispatcher {
    pub fn new(service: Arc<dyn CompletionService>, options: ModelOptions) -> Self {
        Self { service, options }
    }

    pub fn provider(&self) -> &str {
        self.service.name()
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn set_model(&mut self, service: Arc<dyn CompletionService>, model: impl Into<String>) {
        self.service = service;
        self.options.model = model.into();
    }

    /// On failure the store keeps the user turn and nothing else.
    pub fn dispatch(
        &self,
        session: &mut ChatSession,
        submission: Submission,
        renderer: &mut dyn RenderAdapter,
    ) -> Result<DispatchReport, DispatchError> {
        let Submission { text, image } = submission;
        let started = Instant::now();
        let (path, projected_history, outcome) = match image {
            Some(image) => {
                let outcome = self.dispatch_image(session, &text, image, renderer);
                (DispatchPath::Image, None, outcome)
            }
            None => {
                let (history, outcome) = self.dispatch_text(session, &text, renderer);
                (DispatchPath::Text, Some(history), outcome)
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(path = path.as_str(), elapsed_ms, "remote call returned");

        let reply = outcome
            .map_err(DispatchError::from)
            .and_then(|reply| {
                if reply.trim().is_empty() {
                    return Err(DispatchError::MalformedResponse {
                        provider: self.service.name().to_string(),
                        reason: "reply text is empty".to_string(),
                    });
                }
                Ok(reply)
            });

        match reply {
            Ok(reply) => {
                session.append(Turn::assistant_text(reply.clone()));
                session.record_cycle(true);
                session.emit(SessionEvent::RemoteCallFinished {
                    path,
                    reply_chars: reply.chars().count(),
                    elapsed_ms,
                });
                renderer.render(session.snapshot());
                Ok(DispatchReport {
                    path,
                    projected_history,
                    reply,
                })
            }
            Err(err) => {
                session.record_cycle(false);
                warn!(
                    session_id = %session.session_id(),
                    path = path.as_str(),
                    kind = err.kind(),
                    error = %err,
                    "submission cycle failed"
                );
                session.emit(SessionEvent::RemoteCallFailed {
                    path,
                    kind: err.kind().to_string(),
                    error: err.to_string(),
                    elapsed_ms,
                });
                Err(err)
            }
        }
    }

    fn dispatch_image(
        &self,
        session: &mut ChatSession,
        text: &str,
        image: ImageAttachment,
        renderer: &mut dyn RenderAdapter,
    ) -> Result<String, ServiceError> {
        session.append(Turn::user_with_image(text, image.clone()));
        renderer.render(session.snapshot());

        self.announce(session, DispatchPath::Image, 0);
        self.service.generate(&self.options, text, &image)
    }

    fn dispatch_text(
        &self,
        session: &mut ChatSession,
        text: &str,
        renderer: &mut dyn RenderAdapter,
    ) -> (Vec<RequestHistoryEntry>, Result<String, ServiceError>) {
        session.append(Turn::user_text(text));
        renderer.render(session.snapshot());

        let projected = project_history(session.snapshot());
        // The final entry is the turn just appended; it goes out as the live
        // message, everything before it seeds the chat.
        let seed = projected[..projected.len() - 1].to_vec();
        self.announce(session, DispatchPath::Text, seed.len());

        let mut chat = self.service.start_chat(&self.options, seed);
        let outcome = chat.send(text);
        (projected, outcome)
    }

    fn announce(&self, session: &ChatSession, path: DispatchPath, history_entries: usize) {
        info!(
            session_id = %session.session_id(),
            provider = self.service.name(),
            model = %self.options.model,
            path = path.as_str(),
            history_entries,
            "remote call started"
        );
        session.emit(SessionEvent::RemoteCallStarted {
            path,
            provider: self.service.name().to_string(),
            model: self.options.model.clone(),
            history_entries,
        });
    }
}
