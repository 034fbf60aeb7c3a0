use super::cache::MessageList;
use super::dedup::{OperationKey, RequestDedup};
use super::loader::ConversationLoader;
use super::polling::{PollKey, PollOutcome, PollingSupervisor};
use super::state::{SessionSnapshot, SessionStore};
use searchify_core::config::SyncConfig;
use searchify_core::conversation::{
    Conversation, ConversationId, ConversationService, ConversationUpdate, Message, MessageId,
    MessageRole, PlaceholderPolicy,
};
use searchify_core::error::{Result, SearchifyError};
use std::sync::Arc;
use tokio::sync::watch;

/// Synchronizes one client session with the conversation service.
///
/// `SessionSync` is responsible for:
/// - Creating conversations and making them active
/// - Loading conversations through the cache
/// - Appending messages optimistically and reconciling the result
/// - Handing placeholder replies to the polling supervisor
/// - Driving the UI mode
///
/// Presentation code reads state through [`snapshot`](Self::snapshot) or
/// [`subscribe`](Self::subscribe) and never mutates it directly.
pub struct SessionSync {
    service: Arc<dyn ConversationService>,
    store: Arc<SessionStore>,
    loader: Arc<ConversationLoader>,
    creates: RequestDedup<Conversation>,
    appends: RequestDedup<Vec<Message>>,
    lists: RequestDedup<Vec<Conversation>>,
    supervisor: PollingSupervisor,
    policy: PlaceholderPolicy,
    default_title: String,
}

impl SessionSync {
    /// Creates a session backed by `service`.
    ///
    /// # Arguments
    ///
    /// * `service` - The remote conversation service
    /// * `config` - Placeholder markers, polling schedule and default title
    pub fn new(service: Arc<dyn ConversationService>, config: &SyncConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let loader = Arc::new(ConversationLoader::new(service.clone()));
        let policy = config.placeholder_policy();
        let supervisor = PollingSupervisor::new(
            loader.clone(),
            store.clone(),
            policy.clone(),
            config.polling.clone(),
        );

        Self {
            service,
            store,
            loader,
            creates: RequestDedup::new("create"),
            appends: RequestDedup::new("append"),
            lists: RequestDedup::new("list"),
            supervisor,
            policy,
            default_title: config.default_title.clone(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.store.subscribe()
    }

    /// Returns the cached messages of a conversation without touching the
    /// network.
    pub fn cached_messages(&self, id: ConversationId) -> Option<MessageList> {
        self.store.cache().get(id)
    }

    pub fn placeholder_policy(&self) -> &PlaceholderPolicy {
        &self.policy
    }

    pub fn supervisor(&self) -> &PollingSupervisor {
        &self.supervisor
    }

    /// Creates a conversation and makes it active.
    ///
    /// Concurrent creates with the same title share one service call. A blank
    /// title falls back to the configured default.
    ///
    /// # Errors
    ///
    /// Returns the service error; the cache is left untouched.
    pub async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.default_title.as_str())
            .to_string();
        let service = self.service.clone();
        let store = self.store.clone();

        self.creates
            .run(
                OperationKey::Create {
                    title: title.clone(),
                },
                move || async move {
                    let conversation = service.create_conversation(Some(title.as_str())).await?;
                    store.activate_created(conversation.id);
                    tracing::info!(
                        "[SessionSync] Created conversation {} ({})",
                        conversation.id,
                        conversation.display_title()
                    );
                    Ok(conversation)
                },
            )
            .await
    }

    /// Shows a conversation, loading it if it is not cached.
    ///
    /// A cache hit returns without any network call. On a miss, concurrent
    /// loads of the same id share one request. Placeholders in the loaded
    /// list are handed to the polling supervisor.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversation cannot be fetched; the visible
    /// state is left as it was.
    pub async fn load_conversation(&self, id: ConversationId) -> Result<MessageList> {
        if let Some(messages) = self.store.show_cached(id) {
            tracing::debug!("[SessionSync] Conversation {} served from cache", id);
            return Ok(messages);
        }
        self.fetch_into_view(id).await
    }

    /// Re-fetches a conversation even if it is cached.
    pub async fn reload_conversation(&self, id: ConversationId) -> Result<MessageList> {
        self.fetch_into_view(id).await
    }

    async fn fetch_into_view(&self, id: ConversationId) -> Result<MessageList> {
        self.store.request(id);
        match self.loader.fetch(id).await {
            Ok(conversation) => {
                let messages = self.store.apply_loaded(id, conversation.messages);
                tracing::debug!(
                    "[SessionSync] Loaded conversation {} ({} messages)",
                    id,
                    messages.len()
                );
                self.watch_placeholders(id, &messages);
                Ok(messages)
            }
            Err(e) => {
                self.store.abandon_request(id);
                tracing::warn!("[SessionSync] Failed to load conversation {}: {}", id, e);
                Err(e)
            }
        }
    }

    /// Appends a message optimistically.
    ///
    /// The message is shown immediately with a provisional id, then replaced
    /// by the durable batch the service returns. With no conversation given
    /// and none active, one is created first.
    ///
    /// # Returns
    ///
    /// The first durable message of the batch, or `None` if the batch is
    /// empty.
    ///
    /// # Errors
    ///
    /// - `Validation` for blank content, before any network call
    /// - The create or append failure otherwise, after the provisional
    ///   message has been rolled back
    ///
    /// A conversation created by this call stays active and cached when the
    /// append itself fails, so a retry lands in the same conversation.
    pub async fn append_message(
        &self,
        conversation_id: Option<ConversationId>,
        role: MessageRole,
        content: &str,
    ) -> Result<Option<Message>> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SearchifyError::validation("Message content must not be empty"));
        }

        let id = match conversation_id.or(self.store.snapshot().conversation_id) {
            Some(id) => id,
            None => self.create_conversation(None).await?.id,
        };

        let provisional = Message::provisional(role, content);
        let provisional_id = provisional.id;
        let previous = self.store.begin_append(id, provisional);

        let service = self.service.clone();
        let text = content.to_string();
        let result = self
            .appends
            .run(
                OperationKey::append(id, role, content, provisional_id),
                move || async move { service.append_message(id, role, &text).await },
            )
            .await;

        let persisted = match result {
            Ok(persisted) => persisted,
            Err(e) => {
                self.store.rollback_append(id, provisional_id, previous);
                tracing::warn!(
                    "[SessionSync] Append to conversation {} failed, rolled back: {}",
                    id,
                    e
                );
                return Err(e);
            }
        };

        let placeholders: Vec<MessageId> = persisted
            .iter()
            .filter(|m| self.policy.is_placeholder(m))
            .map(|m| m.id)
            .collect();
        self.store
            .commit_append(id, provisional_id, &persisted, !placeholders.is_empty());
        for message_id in placeholders {
            self.supervisor.start(id, message_id);
        }

        tracing::debug!(
            "[SessionSync] Appended {} message(s) to conversation {}",
            persisted.len(),
            id
        );
        Ok(persisted.into_iter().next())
    }

    /// Submits a research query from the landing view or a follow-up.
    pub async fn submit_query(&self, query: &str) -> Result<Option<Message>> {
        self.append_message(None, MessageRole::User, query).await
    }

    /// Clears the view for a new conversation.
    ///
    /// Poll tasks of the previous conversation keep running and write into
    /// its cache entry.
    pub fn start_new_conversation(&self) {
        if let Some(previous) = self.store.reset_to_idle() {
            tracing::info!(
                "[SessionSync] Started new conversation (left {}, {} poll task(s) detached)",
                previous,
                self.supervisor.active_count()
            );
        }
    }

    /// Lists conversations known to the service.
    pub async fn list_conversations(&self, active_only: bool) -> Result<Vec<Conversation>> {
        let service = self.service.clone();
        self.lists
            .run(OperationKey::List { active_only }, move || async move {
                service.list_conversations(active_only).await
            })
            .await
    }

    /// Renames a conversation. Cached messages are not affected.
    pub async fn rename_conversation(&self, id: ConversationId, title: &str) -> Result<Conversation> {
        let title = title.trim();
        if title.is_empty() {
            return Err(SearchifyError::validation("Title must not be empty"));
        }
        let conversation = self
            .service
            .update_conversation(id, &ConversationUpdate::rename(title))
            .await?;
        tracing::info!("[SessionSync] Renamed conversation {} to {}", id, title);
        Ok(conversation)
    }

    /// Deletes a conversation.
    ///
    /// On success its poll tasks are cancelled, its cache entry is dropped
    /// and, if it was displayed, the view returns to idle.
    pub async fn delete_conversation(&self, id: ConversationId, permanent: bool) -> Result<()> {
        self.service.delete_conversation(id, permanent).await?;
        self.supervisor.cancel_conversation(id);
        self.store.forget_conversation(id);
        tracing::info!("[SessionSync] Deleted conversation {}", id);
        Ok(())
    }

    /// Records how many sources the current answer cites.
    pub fn record_sources(&self, count: usize) {
        self.store.record_sources(count);
    }

    /// Waits for a placeholder to be resolved or given up on.
    ///
    /// # Returns
    ///
    /// `None` if no poll task is running for the message.
    pub async fn wait_for_resolution(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Option<PollOutcome> {
        self.supervisor
            .wait(PollKey::new(conversation_id, message_id))
            .await
    }

    /// Cancels all poll tasks and waits for them to stop.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
        tracing::debug!("[SessionSync] Session shut down");
    }

    fn watch_placeholders(&self, id: ConversationId, messages: &[Message]) {
        for message in messages.iter().filter(|m| self.policy.is_placeholder(m)) {
            self.supervisor.start(id, message.id);
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
