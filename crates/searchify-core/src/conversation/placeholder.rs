//! Detection of "still computing" assistant messages.

use super::message::{Message, MessageStatus};

/// Sentinel phrases the service writes into an assistant message while the
/// answer is being produced.
///
/// These mirror the service's copy. If the service changes them, placeholders
/// stop being recognized and polling silently never starts, so they are
/// configurable and a structured status always takes precedence.
pub const DEFAULT_PLACEHOLDER_MARKERS: &[&str] = &[
    "Processing your research query...",
    "Generating response...",
];

/// Decides whether a message is a placeholder awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderPolicy {
    markers: Vec<String>,
}

impl PlaceholderPolicy {
    /// Creates a policy from a set of sentinel phrases.
    ///
    /// Markers are compared trimmed and case-insensitively; blank markers are
    /// dropped.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| normalize(m.as_ref()))
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Returns true if `content` is one of the sentinel phrases.
    pub fn matches_content(&self, content: &str) -> bool {
        let content = normalize(content);
        self.markers.iter().any(|m| *m == content)
    }

    /// Returns true if `message` is a durable assistant message still waiting
    /// for its real content.
    pub fn is_placeholder(&self, message: &Message) -> bool {
        if !message.is_assistant() || message.is_provisional() {
            return false;
        }
        match message.status {
            Some(MessageStatus::Pending) => true,
            Some(MessageStatus::Complete) => false,
            None => self.matches_content(&message.content),
        }
    }
}

impl Default for PlaceholderPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_MARKERS)
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}
