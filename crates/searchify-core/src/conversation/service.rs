//! Remote conversation service trait.
//!
//! Defines the interface the client uses to talk to the backend that stores
//! conversations and produces assistant replies.

use super::message::{Message, MessageRole};
use super::model::{Conversation, ConversationId, ConversationUpdate};
use crate::error::Result;
use async_trait::async_trait;

/// An abstract client for the remote conversation service.
///
/// This trait decouples the synchronization engine from the transport
/// (HTTP, in-process fake, ...).
///
/// # Implementation Notes
///
/// - `append_message` returns the persisted user message first, followed by
///   zero or more generated messages. A generated assistant message may be a
///   placeholder that the service later rewrites in place.
/// - Implementations must be safe to call concurrently.
#[async_trait]
pub trait ConversationService: Send + Sync {
    /// Creates a new conversation.
    ///
    /// # Arguments
    ///
    /// * `title` - Optional title; the service picks a default when `None`
    async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation>;

    /// Lists conversation summaries (without messages).
    ///
    /// # Arguments
    ///
    /// * `active_only` - Skip soft-deleted conversations
    async fn list_conversations(&self, active_only: bool) -> Result<Vec<Conversation>>;

    /// Fetches a conversation with its full message list.
    ///
    /// # Returns
    ///
    /// - `Ok(Conversation)`: conversation with messages in append order
    /// - `Err(SearchifyError::NotFound)`: no such conversation
    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation>;

    /// Appends a message and returns every message the call persisted.
    async fn append_message(
        &self,
        id: ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<Vec<Message>>;

    /// Deletes a conversation (soft delete unless `permanent`).
    async fn delete_conversation(&self, id: ConversationId, permanent: bool) -> Result<()>;

    /// Updates a conversation's title or active flag.
    async fn update_conversation(
        &self,
        id: ConversationId,
        update: &ConversationUpdate,
    ) -> Result<Conversation>;
}
