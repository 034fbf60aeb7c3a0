//! Conversation domain module.
//!
//! This module contains all conversation-related domain models and the
//! interface of the remote service that persists them.
//!
//! # Module Structure
//!
//! - `model`: Conversation entity and identifiers (`Conversation`, `ConversationId`)
//! - `message`: Message types (`Message`, `MessageId`, `MessageRole`)
//! - `placeholder`: Detection of unresolved assistant replies (`PlaceholderPolicy`)
//! - `ui_mode`: Coarse session mode (`UiMode`)
//! - `service`: Remote service trait (`ConversationService`)

mod message;
mod model;
mod placeholder;
mod service;
mod ui_mode;

// Re-export public API
pub use message::{Message, MessageId, MessageRole, MessageStatus};
pub use model::{Conversation, ConversationId, ConversationUpdate, DEFAULT_CONVERSATION_TITLE};
pub use placeholder::{DEFAULT_PLACEHOLDER_MARKERS, PlaceholderPolicy};
pub use service::ConversationService;
pub use ui_mode::UiMode;
