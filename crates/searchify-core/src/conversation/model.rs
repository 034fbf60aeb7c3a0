//! Conversation domain model.
//!
//! This module contains the core Conversation entity that the client
//! displays and synchronizes with the remote service.

use super::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Title used when a conversation is created without one.
///
/// The service replaces it with the first user message once one arrives.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Opaque identifier assigned by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for ConversationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// A persisted, ordered thread of messages.
///
/// `messages` is empty for summaries returned by list/create calls and
/// populated for a full fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Returns the title, or the default title when none is set.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_CONVERSATION_TITLE)
    }
}

/// Partial update applied to a conversation's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ConversationUpdate {
    pub fn rename(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            is_active: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_parse() {
        assert_eq!(" 7 ".parse::<ConversationId>().unwrap(), ConversationId(7));
        assert!("seven".parse::<ConversationId>().is_err());
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let json = serde_json::to_value(ConversationUpdate::rename("Qubits")).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Qubits" }));
        assert!(ConversationUpdate::default().is_empty());
    }
}
