//! Session synchronization services.
//!
//! This module contains the client-side engine that keeps one session in
//! step with the conversation service: the conversation cache, request
//! deduplication, the polling supervisor and the session manager that
//! drives them.

mod cache;
mod dedup;
mod loader;
mod manager;
#[cfg(test)]
mod mock_service;
mod polling;
mod state;

pub use cache::{ConversationCache, MessageList};
pub use dedup::{OperationKey, RequestDedup};
pub use loader::ConversationLoader;
pub use manager::SessionSync;
pub use polling::{PollKey, PollOutcome, PollingSupervisor};
pub use state::{SessionSnapshot, SessionStore};
