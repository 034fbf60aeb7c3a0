//! Session state and its atomic transitions.
//!
//! Every change to the visible state goes through a single `send_modify` on a
//! watch channel, and the matching cache write happens inside the same
//! closure. Observers therefore see either the state before a transition or
//! the state after it, and the cache never disagrees with the visible list
//! of the active conversation.

use super::cache::{ConversationCache, MessageList};
use searchify_core::conversation::{ConversationId, Message, MessageId, UiMode};
use std::sync::Arc;
use tokio::sync::watch;

/// Progress reported while the reply to a submission is still pending.
const PROGRESS_AWAITING_REPLY: u8 = 50;
const PROGRESS_DONE: u8 = 100;

/// Immutable view of the session handed to presentation code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Conversation currently displayed.
    pub conversation_id: Option<ConversationId>,
    /// Visible message list of the active conversation.
    pub messages: MessageList,
    pub mode: UiMode,
    /// Assistant message the results view is focused on.
    pub current_response_id: Option<MessageId>,
    pub source_count: usize,
    /// Coarse progress of the current submission, 0-100.
    pub progress: u8,
    /// Most recent conversation the user asked to see. A load that
    /// completes for any other id only fills the cache.
    pub requested_conversation: Option<ConversationId>,
}

impl SessionSnapshot {
    pub fn is_active(&self, id: ConversationId) -> bool {
        self.conversation_id == Some(id)
    }

    fn has_provisional(&self) -> bool {
        self.messages.iter().any(Message::is_provisional)
    }

    /// Makes `id` the displayed conversation, clearing per-conversation
    /// counters when it differs from the current one.
    fn switch_to(&mut self, id: ConversationId, messages: MessageList) {
        if !self.is_active(id) {
            self.current_response_id = None;
            self.source_count = 0;
            self.progress = 0;
        }
        self.conversation_id = Some(id);
        self.requested_conversation = Some(id);
        self.messages = messages;
    }
}

/// Mode and progress before a submission, restored if its append fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AppendCheckpoint {
    pub mode: UiMode,
    pub progress: u8,
}

/// Owner of the session snapshot and the conversation cache.
pub struct SessionStore {
    state: watch::Sender<SessionSnapshot>,
    cache: ConversationCache,
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            state,
            cache: ConversationCache::new(),
        }
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    /// Activates a freshly created conversation with an empty list.
    ///
    /// Idempotent: re-activating the conversation that is already displayed
    /// leaves its messages alone.
    pub(crate) fn activate_created(&self, id: ConversationId) {
        self.state.send_modify(|s| {
            let messages = self.cache.insert_empty(id);
            if !s.is_active(id) {
                s.switch_to(id, messages);
                s.mode = UiMode::Idle;
                tracing::debug!("[SessionStore] Activated new conversation {}", id);
            }
        });
    }

    /// Displays a cached conversation.
    ///
    /// # Returns
    ///
    /// The cached list, or `None` (and no state change) on a cache miss.
    pub(crate) fn show_cached(&self, id: ConversationId) -> Option<MessageList> {
        let mut shown = None;
        self.state.send_if_modified(|s| {
            let Some(messages) = self.cache.get(id) else {
                return false;
            };
            s.switch_to(id, messages.clone());
            if !s.has_provisional() {
                s.mode = UiMode::for_loaded(messages.len());
            }
            shown = Some(messages);
            true
        });
        shown
    }

    /// Records that the user asked to see `id`.
    pub(crate) fn request(&self, id: ConversationId) {
        self.state.send_modify(|s| s.requested_conversation = Some(id));
    }

    /// Withdraws a request whose load failed, unless a newer one replaced it.
    pub(crate) fn abandon_request(&self, id: ConversationId) {
        self.state.send_if_modified(|s| {
            if s.requested_conversation != Some(id) {
                return false;
            }
            s.requested_conversation = s.conversation_id;
            true
        });
    }

    /// Stores a freshly fetched message list.
    ///
    /// Provisional messages already in the cache entry are kept at the end,
    /// since their append has not settled yet. The visible list is only
    /// replaced if `id` is still the conversation the user asked for.
    pub(crate) fn apply_loaded(&self, id: ConversationId, fetched: Vec<Message>) -> MessageList {
        let mut stored = MessageList::default();
        self.state.send_modify(|s| {
            let mut merged = fetched;
            if let Some(current) = self.cache.get(id) {
                merged.extend(
                    current
                        .iter()
                        .filter(|m| m.is_provisional())
                        .cloned(),
                );
            }
            let messages = self.cache.insert(id, merged);

            if s.requested_conversation == Some(id) {
                s.switch_to(id, messages.clone());
                if !s.has_provisional() {
                    s.mode = UiMode::for_loaded(messages.len());
                }
            } else {
                tracing::debug!(
                    "[SessionStore] Conversation {} loaded in background (requested: {:?})",
                    id,
                    s.requested_conversation
                );
            }
            stored = messages;
        });
        stored
    }

    /// Echoes a provisional message ahead of its append.
    ///
    /// # Returns
    ///
    /// The mode and progress before the submission, used to roll back on
    /// failure.
    pub(crate) fn begin_append(&self, id: ConversationId, provisional: Message) -> AppendCheckpoint {
        let mut previous = AppendCheckpoint {
            mode: UiMode::Idle,
            progress: 0,
        };
        self.state.send_modify(|s| {
            previous = AppendCheckpoint {
                mode: s.mode,
                progress: s.progress,
            };
            let push = |current: &[Message]| {
                let mut next = current.to_vec();
                next.push(provisional.clone());
                next
            };
            let cached = self.cache.rebuild(id, push);

            if s.is_active(id) {
                s.messages = cached.unwrap_or_else(|| Arc::new(push(&s.messages)));
                s.mode = s.mode.on_submit();
                s.progress = 0;
            }
        });
        previous
    }

    /// Replaces a provisional message with the durable batch of its append.
    ///
    /// Messages already present by id (a load raced the append) are not
    /// duplicated. `awaiting_reply` is true when the batch holds a
    /// placeholder that still has to be resolved.
    ///
    /// # Returns
    ///
    /// The id of the last assistant message in the batch, if any.
    pub(crate) fn commit_append(
        &self,
        id: ConversationId,
        provisional_id: MessageId,
        persisted: &[Message],
        awaiting_reply: bool,
    ) -> Option<MessageId> {
        let response_id = persisted.iter().rev().find(|m| m.is_assistant()).map(|m| m.id);
        let replace = |current: &[Message]| {
            let mut next: Vec<Message> = current
                .iter()
                .filter(|m| m.id != provisional_id)
                .cloned()
                .collect();
            for message in persisted {
                if !next.iter().any(|m| m.id == message.id) {
                    next.push(message.clone());
                }
            }
            next
        };

        self.state.send_modify(|s| {
            let cached = self.cache.rebuild(id, replace);
            if s.is_active(id) {
                s.messages = cached.unwrap_or_else(|| Arc::new(replace(&s.messages)));
                s.mode = s.mode.on_reply(response_id.is_some());
                if response_id.is_some() {
                    s.current_response_id = response_id;
                }
                s.progress = if awaiting_reply {
                    PROGRESS_AWAITING_REPLY
                } else {
                    PROGRESS_DONE
                };
            }
        });
        response_id
    }

    /// Removes a provisional message whose append failed.
    ///
    /// Mode and progress are restored only if nothing else moved the mode
    /// since the submission.
    pub(crate) fn rollback_append(
        &self,
        id: ConversationId,
        provisional_id: MessageId,
        previous: AppendCheckpoint,
    ) {
        let remove = |current: &[Message]| {
            current
                .iter()
                .filter(|m| m.id != provisional_id)
                .cloned()
                .collect::<Vec<_>>()
        };
        self.state.send_modify(|s| {
            let cached = self.cache.rebuild(id, remove);
            if s.is_active(id) {
                s.messages = cached.unwrap_or_else(|| Arc::new(remove(&s.messages)));
                if s.mode == previous.mode.on_submit() {
                    s.mode = previous.mode;
                    s.progress = previous.progress;
                }
            }
        });
    }

    /// Writes the final content of a resolved placeholder.
    ///
    /// The cache entry is updated whether or not the conversation is still
    /// displayed.
    ///
    /// # Returns
    ///
    /// `true` if a cached or visible message with the resolved id was
    /// replaced.
    pub(crate) fn resolve_placeholder(&self, id: ConversationId, resolved: &Message) -> bool {
        let replace = |current: &[Message]| {
            current
                .iter()
                .map(|m| if m.id == resolved.id { resolved.clone() } else { m.clone() })
                .collect::<Vec<_>>()
        };
        let mut applied = false;
        self.state.send_if_modified(|s| {
            applied = self
                .cache
                .get(id)
                .is_some_and(|cached| cached.iter().any(|m| m.id == resolved.id));
            if applied {
                self.cache.rebuild(id, replace);
            }
            if s.is_active(id) && s.messages.iter().any(|m| m.id == resolved.id) {
                s.messages = Arc::new(replace(&s.messages));
                s.current_response_id = Some(resolved.id);
                s.progress = PROGRESS_DONE;
                applied = true;
                return true;
            }
            false
        });
        applied
    }

    /// Returns to the empty landing state. The cache is kept.
    pub(crate) fn reset_to_idle(&self) -> Option<ConversationId> {
        let mut previous = None;
        self.state.send_modify(|s| {
            previous = s.conversation_id;
            *s = SessionSnapshot::default();
        });
        previous
    }

    /// Drops a deleted conversation from the cache and the view.
    pub(crate) fn forget_conversation(&self, id: ConversationId) {
        self.state.send_modify(|s| {
            self.cache.remove(id);
            if s.is_active(id) {
                *s = SessionSnapshot::default();
            } else if s.requested_conversation == Some(id) {
                s.requested_conversation = s.conversation_id;
            }
        });
    }

    pub(crate) fn record_sources(&self, count: usize) {
        self.state.send_if_modified(|s| {
            let changed = s.source_count != count;
            s.source_count = count;
            changed
        });
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
