//! Wire DTOs for the chat REST API.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use searchify_core::conversation::{
    Conversation, ConversationId, Message, MessageId, MessageRole, MessageStatus,
};
use searchify_core::error::{Result, SearchifyError};

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CreateChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppendMessageRequest<'a> {
    pub role: MessageRole,
    pub content: &'a str,
}

/// Error body produced by the service (`{"detail": "..."}`).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Flattens `detail`, which is a string for handled errors and a list of
    /// objects for request validation failures.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Response bodies (Anti-Corruption Layer)
// ============================================================================

/// Message as returned by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: i64,
    #[serde(default)]
    pub chat_id: Option<i64>,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
    /// Structured status, only sent by services that support it.
    #[serde(default)]
    pub status: Option<MessageStatus>,
}

/// Chat summary as returned by create/list/update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDto {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Chat with its messages, as returned by `GET /chats/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatWithMessagesDto {
    #[serde(flatten)]
    pub chat: ChatDto,
    #[serde(default)]
    pub messages: Vec<MessageDto>,
}

fn default_is_active() -> bool {
    true
}

impl TryFrom<MessageDto> for Message {
    type Error = SearchifyError;

    fn try_from(dto: MessageDto) -> Result<Self> {
        Ok(Message {
            id: MessageId::Durable(dto.id),
            role: dto.role,
            content: dto.content,
            created_at: parse_timestamp(&dto.created_at)?,
            status: dto.status,
        })
    }
}

impl TryFrom<ChatDto> for Conversation {
    type Error = SearchifyError;

    fn try_from(dto: ChatDto) -> Result<Self> {
        Ok(Conversation {
            id: ConversationId(dto.id),
            title: dto.title,
            messages: Vec::new(),
            is_active: dto.is_active,
            created_at: parse_timestamp(&dto.created_at)?,
            updated_at: dto.updated_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

impl TryFrom<ChatWithMessagesDto> for Conversation {
    type Error = SearchifyError;

    fn try_from(dto: ChatWithMessagesDto) -> Result<Self> {
        let mut conversation = Conversation::try_from(dto.chat)?;
        conversation.messages = dto
            .messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(conversation)
    }
}

/// Parses a service timestamp.
///
/// The service emits naive ISO 8601 timestamps (no offset) for database
/// values; those are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| SearchifyError::Serialization {
            format: "timestamp".to_string(),
            message: format!("'{}': {}", raw, e),
        })
}
