//! Coarse UI mode of a chat session.

use serde::{Deserialize, Serialize};

/// Represents what the chat surface is currently showing.
///
/// Transitions are driven by the session manager:
///
/// ```text
/// Idle ──submit──▶ Submitting ──reply──▶ ShowingResults ──follow-up──▶ Conversational
///   ▲                                                                        │
///   └──────────────────────────── new conversation ◀─────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiMode {
    /// No active query.
    #[default]
    Idle,
    /// A query was sent and its reply is pending.
    Submitting,
    /// The first answer of a conversation is ready.
    ShowingResults,
    /// Free-form follow-up chat on an existing conversation.
    Conversational,
}

impl UiMode {
    /// Mode to show right after a conversation's messages are loaded.
    pub fn for_loaded(message_count: usize) -> Self {
        if message_count == 0 {
            UiMode::Idle
        } else {
            UiMode::Conversational
        }
    }

    /// Mode entered when the user submits input from this mode.
    pub fn on_submit(self) -> Self {
        match self {
            UiMode::Idle | UiMode::Submitting => UiMode::Submitting,
            UiMode::ShowingResults | UiMode::Conversational => UiMode::Conversational,
        }
    }

    /// Mode entered once a reply batch has been acknowledged.
    pub fn on_reply(self, has_assistant_reply: bool) -> Self {
        match self {
            UiMode::Submitting if has_assistant_reply => UiMode::ShowingResults,
            UiMode::Submitting | UiMode::Idle => UiMode::Conversational,
            other => other,
        }
    }
}
