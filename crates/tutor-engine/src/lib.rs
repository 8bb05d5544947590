//! Chat session core for the physics tutor.
//!
//! A [`ChatSession`] owns the turn store for one conversation. A
//! [`TurnDispatcher`] runs each submission cycle against a
//! [`CompletionService`], choosing the single-shot image path or the
//! multi-turn text path.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod service;
pub mod session;
pub mod upload;

pub use config::{load_env_file, TutorConfig, DEFAULT_MODEL, TUTOR_TAGLINE, TUTOR_TITLE};
pub use dispatcher::{
    DispatchPath, DispatchReport, NoopRenderer, RenderAdapter, Submission, TurnDispatcher,
};
pub use error::{DispatchError, ServiceError};
pub use service::{
    default_service_registry, ChatHandle, CompletionService, DryrunService, GeminiService,
    ModelOptions, ServiceRegistry,
};
pub use session::{ChatSession, SessionSummary};
pub use upload::{load_image_attachment, PendingUpload};
