//! End-to-end tests of the session engine against an in-memory backend.

use async_trait::async_trait;
use chrono::Utc;
use searchify_application::{PollOutcome, SessionSync};
use searchify_core::config::{PollingConfig, SyncConfig};
use searchify_core::conversation::{
    Conversation, ConversationId, ConversationService, ConversationUpdate, Message, MessageId,
    MessageRole, MessageStatus, UiMode,
};
use searchify_core::error::{Result, SearchifyError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TITLE_LENGTH: usize = 30;

/// Backend stub that answers user messages with a pending assistant message
/// and retitles "New Chat" conversations after their first question.
#[derive(Default)]
struct BackendStub {
    chats: Mutex<HashMap<ConversationId, Conversation>>,
    next_id: AtomicUsize,
    fetches: AtomicUsize,
}

impl BackendStub {
    fn next(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1
    }

    fn finish(&self, chat: ConversationId, message: MessageId, content: &str) {
        let mut chats = self.chats.lock().unwrap();
        let message = chats
            .get_mut(&chat)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message))
            .unwrap();
        message.content = content.to_string();
        message.status = Some(MessageStatus::Complete);
    }

    fn title(&self, chat: ConversationId) -> Option<String> {
        self.chats.lock().unwrap().get(&chat).and_then(|c| c.title.clone())
    }
}

#[async_trait]
impl ConversationService for BackendStub {
    async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        let chat = Conversation {
            id: ConversationId(self.next()),
            title: title.map(str::to_string),
            messages: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.chats.lock().unwrap().insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn list_conversations(&self, active_only: bool) -> Result<Vec<Conversation>> {
        let chats = self.chats.lock().unwrap();
        Ok(chats
            .values()
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect())
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.chats
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| SearchifyError::not_found("Conversation", id.to_string()))
    }

    async fn append_message(
        &self,
        id: ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<Vec<Message>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let user = Message::durable(self.next(), role, content, Utc::now());
        let pending = Message::durable(
            self.next(),
            MessageRole::Assistant,
            "Processing your research query...",
            Utc::now(),
        )
        .with_status(MessageStatus::Pending);

        let mut chats = self.chats.lock().unwrap();
        let chat = chats
            .get_mut(&id)
            .ok_or_else(|| SearchifyError::not_found("Conversation", id.to_string()))?;
        if chat.title.as_deref().is_none_or(|t| t == "New Chat") && chat.messages.is_empty() {
            let mut title: String = content.chars().take(TITLE_LENGTH).collect();
            if content.chars().count() > TITLE_LENGTH {
                title.push_str("...");
            }
            chat.title = Some(title.trim().to_string());
        }
        chat.messages.push(user.clone());
        chat.messages.push(pending.clone());
        Ok(vec![user, pending])
    }

    async fn delete_conversation(&self, id: ConversationId, permanent: bool) -> Result<()> {
        let mut chats = self.chats.lock().unwrap();
        if permanent {
            chats.remove(&id);
        } else if let Some(chat) = chats.get_mut(&id) {
            chat.is_active = false;
        }
        Ok(())
    }

    async fn update_conversation(
        &self,
        id: ConversationId,
        update: &ConversationUpdate,
    ) -> Result<Conversation> {
        let mut chats = self.chats.lock().unwrap();
        let chat = chats
            .get_mut(&id)
            .ok_or_else(|| SearchifyError::not_found("Conversation", id.to_string()))?;
        if let Some(title) = &update.title {
            chat.title = Some(title.clone());
        }
        Ok(chat.clone())
    }
}

fn config(timeout_ms: u64) -> SyncConfig {
    SyncConfig {
        polling: PollingConfig {
            fast_interval_ms: 500,
            fast_retries: 4,
            slow_interval_ms: 2_000,
            timeout_ms,
        },
        ..SyncConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn research_session_end_to_end() {
    let backend = Arc::new(BackendStub::default());
    let sync = SessionSync::new(backend.clone(), &config(30_000));
    let mut updates = sync.subscribe();

    // First query from the landing view
    let query = "What is quantum error correction and why does it matter?";
    let user = sync.submit_query(query).await.unwrap().unwrap();
    assert_eq!(user.content, query);

    let snapshot = sync.snapshot();
    let chat = snapshot.conversation_id.unwrap();
    let pending_id = snapshot.current_response_id.unwrap();
    assert_eq!(snapshot.mode, UiMode::ShowingResults);
    assert_eq!(
        backend.title(chat).as_deref(),
        Some("What is quantum error correcti...")
    );
    assert!(updates.has_changed().unwrap());

    // The backend finishes the answer a few seconds later
    {
        let backend = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            backend.finish(chat, pending_id, "It protects fragile qubits from noise.");
        });
    }
    let outcome = sync.wait_for_resolution(chat, pending_id).await.unwrap();
    assert!(matches!(outcome, PollOutcome::Resolved { .. }));

    let resolved = updates.borrow_and_update().clone();
    assert_eq!(resolved.messages.len(), 2);
    assert_eq!(resolved.messages[1].id, pending_id);
    assert_eq!(resolved.messages[1].content, "It protects fragile qubits from noise.");

    // A follow-up switches to the conversational view
    sync.submit_query("How many physical qubits per logical qubit?")
        .await
        .unwrap();
    let snapshot = sync.snapshot();
    assert_eq!(snapshot.mode, UiMode::Conversational);
    assert_eq!(snapshot.messages.len(), 4);
    assert_eq!(snapshot.progress, 50);

    // Leaving and coming back is served from the cache
    sync.start_new_conversation();
    let fetches = backend.fetches.load(Ordering::SeqCst);
    let messages = sync.load_conversation(chat).await.unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(sync.snapshot().mode, UiMode::Conversational);
    assert_eq!(backend.fetches.load(Ordering::SeqCst), fetches);

    let listed = sync.list_conversations(true).await.unwrap();
    assert_eq!(listed.len(), 1);

    sync.shutdown().await;
    assert_eq!(sync.supervisor().active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unresolved_placeholder_is_left_after_budget() {
    let backend = Arc::new(BackendStub::default());
    let sync = SessionSync::new(backend.clone(), &config(10_000));

    sync.submit_query("Will this ever finish?").await.unwrap();
    let snapshot = sync.snapshot();
    let chat = snapshot.conversation_id.unwrap();
    let pending_id = snapshot.current_response_id.unwrap();

    let outcome = sync.wait_for_resolution(chat, pending_id).await.unwrap();
    assert!(matches!(outcome, PollOutcome::TimedOut { .. }));

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.messages[1].content, "Processing your research query...");
    assert_eq!(snapshot.progress, 50);
    assert!(!sync.supervisor().is_polling(chat, pending_id));

    // Nothing keeps polling once the budget is spent
    let fetches = backend.fetches.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.fetches.load(Ordering::SeqCst), fetches);
}

#[tokio::test(start_paused = true)]
async fn concurrent_reloads_share_one_fetch() {
    let backend = Arc::new(BackendStub::default());
    let chat = backend.create_conversation(Some("Seeded")).await.unwrap().id;
    let sync = SessionSync::new(backend.clone(), &config(10_000));

    let (a, b, c) = tokio::join!(
        sync.reload_conversation(chat),
        sync.reload_conversation(chat),
        sync.load_conversation(chat),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);
    assert_eq!(sync.snapshot().mode, UiMode::Idle);
}
