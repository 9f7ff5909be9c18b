pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::{ErrorBody, Message};
pub use types::{Attachment, AuthenticatedUser, ChatMessage, MessageKind};
