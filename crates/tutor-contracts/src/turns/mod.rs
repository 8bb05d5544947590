mod history;
mod store;
mod transcript;
mod turn;

pub use history::{project_history, RequestHistoryEntry, Role};
pub use store::TurnStore;
pub use transcript::{describe_image, render_transcript_markdown, render_turn_markdown};
pub use turn::{Author, ImageAttachment, Payload, PayloadKind, Turn};
