use searchify_core::conversation::{ConversationId, Message};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Immutable, cheaply clonable message list.
pub type MessageList = Arc<Vec<Message>>;

/// In-memory cache of conversation message lists.
///
/// Entries are never patched in place: every write swaps the whole list for a
/// new one, so a reader holding a `MessageList` never sees a half-applied
/// change. The cache lives for one session and is never expired.
///
/// Writes happen only from inside a `SessionStore` transition, which keeps the
/// cache and the visible list in step.
#[derive(Debug, Default)]
pub struct ConversationCache {
    entries: RwLock<HashMap<ConversationId, MessageList>>,
}

impl ConversationCache {
    /// Creates a new empty ConversationCache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cached message list of a conversation.
    ///
    /// # Returns
    ///
    /// `Some(messages)` if the conversation is cached, `None` otherwise.
    pub fn get(&self, id: ConversationId) -> Option<MessageList> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&id).cloned()
    }

    pub fn contains(&self, id: ConversationId) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(&id)
    }

    /// Stores a message list, replacing any previous entry.
    pub(crate) fn insert(&self, id: ConversationId, messages: Vec<Message>) -> MessageList {
        let list = Arc::new(messages);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(id, list.clone());
        list
    }

    /// Creates an empty entry unless one already exists.
    pub(crate) fn insert_empty(&self, id: ConversationId) -> MessageList {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(id).or_default().clone()
    }

    /// Rebuilds an existing entry from its latest value.
    ///
    /// `rebuild` runs under the write lock, so concurrent rebuilds serialize
    /// and each one starts from the result of the previous. Missing entries
    /// are left missing: a partial list must never masquerade as a loaded
    /// conversation.
    pub(crate) fn rebuild<F>(&self, id: ConversationId, rebuild: F) -> Option<MessageList>
    where
        F: FnOnce(&[Message]) -> Vec<Message>,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let current = entries.get(&id)?;
        let list = Arc::new(rebuild(current));
        entries.insert(id, list.clone());
        Some(list)
    }

    /// Removes a conversation from the cache.
    pub(crate) fn remove(&self, id: ConversationId) -> Option<MessageList> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
