//! Conversation message types.
//!
//! This module contains types for representing messages in a conversation,
//! including roles, identifiers and the optional completion status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
}

impl MessageRole {
    /// Returns the wire representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a message.
///
/// Durable identifiers are issued by the service. Provisional identifiers are
/// generated locally for optimistic echoes and never leave the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    Durable(i64),
    Provisional(Uuid),
}

impl MessageId {
    /// Generates a fresh provisional identifier.
    pub fn provisional() -> Self {
        MessageId::Provisional(Uuid::new_v4())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, MessageId::Provisional(_))
    }

    /// Returns the service-issued identifier, if any.
    pub fn as_durable(&self) -> Option<i64> {
        match self {
            MessageId::Durable(id) => Some(*id),
            MessageId::Provisional(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Durable(id) => write!(f, "{}", id),
            MessageId::Provisional(uuid) => write!(f, "tmp-{}", uuid),
        }
    }
}

/// Structured completion status, when the service reports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// The assistant is still computing the answer.
    Pending,
    /// The content is final.
    Complete,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Completion status reported by the service (absent on older services).
    #[serde(default)]
    pub status: Option<MessageStatus>,
}

impl Message {
    /// Creates an optimistic local echo with a fresh provisional id.
    pub fn provisional(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::provisional(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            status: None,
        }
    }

    /// Creates a message acknowledged by the service.
    pub fn durable(
        id: i64,
        role: MessageRole,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::Durable(id),
            role,
            content: content.into(),
            created_at,
            status: None,
        }
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_ids_are_unique() {
        let a = Message::provisional(MessageRole::User, "hello");
        let b = Message::provisional(MessageRole::User, "hello");
        assert!(a.is_provisional());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_message_id_display() {
        assert_eq!(MessageId::Durable(42).to_string(), "42");
        assert!(MessageId::provisional().to_string().starts_with("tmp-"));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&MessageRole::Assistant).unwrap(), "\"assistant\"");
        let role: MessageRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, MessageRole::User);
    }
}
