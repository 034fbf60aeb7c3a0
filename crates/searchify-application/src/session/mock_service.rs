//! In-memory conversation service for tests.

use async_trait::async_trait;
use chrono::Utc;
use searchify_core::conversation::{
    Conversation, ConversationId, ConversationService, ConversationUpdate, Message, MessageId,
    MessageRole, DEFAULT_PLACEHOLDER_MARKERS,
};
use searchify_core::error::{Result, SearchifyError};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the mock answers an appended user message with.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    None,
    Placeholder,
    Answer(String),
}

struct MockState {
    conversations: BTreeMap<ConversationId, Conversation>,
    next_conversation_id: i64,
    next_message_id: i64,
    reply: Reply,
    failing_loads: usize,
    fail_appends: bool,
}

pub(crate) struct MockConversationService {
    state: Mutex<MockState>,
    latency: Duration,
    creates: AtomicUsize,
    loads: AtomicUsize,
    appends: AtomicUsize,
}

impl MockConversationService {
    pub(crate) fn new(reply: Reply) -> Self {
        Self {
            state: Mutex::new(MockState {
                conversations: BTreeMap::new(),
                next_conversation_id: 1,
                next_message_id: 1,
                reply,
                failing_loads: 0,
                fail_appends: false,
            }),
            latency: Duration::ZERO,
            creates: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
            appends: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_placeholder_replies() -> Self {
        Self::new(Reply::Placeholder)
    }

    /// Every call sleeps this long before answering.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Seeds a conversation with the given messages.
    pub(crate) fn insert(&self, id: i64, messages: &[(MessageRole, &str)]) -> ConversationId {
        let mut state = self.state.lock().unwrap();
        let id = ConversationId(id);
        let mut conversation = new_conversation(id, "Seeded");
        for (role, content) in messages {
            let message_id = state.next_message_id;
            state.next_message_id += 1;
            conversation
                .messages
                .push(Message::durable(message_id, *role, *content, Utc::now()));
        }
        state.conversations.insert(id, conversation);
        state.next_conversation_id = state.next_conversation_id.max(id.0 + 1);
        id
    }

    /// Overwrites a message in place, the way the backend finishes a reply.
    pub(crate) fn resolve(&self, id: ConversationId, message_id: MessageId, content: &str) {
        let mut state = self.state.lock().unwrap();
        let message = state
            .conversations
            .get_mut(&id)
            .and_then(|c| c.messages.iter_mut().find(|m| m.id == message_id))
            .unwrap();
        message.content = content.to_string();
    }

    pub(crate) fn fail_next_loads(&self, count: usize) {
        self.state.lock().unwrap().failing_loads = count;
    }

    pub(crate) fn fail_appends(&self, fail: bool) {
        self.state.lock().unwrap().fail_appends = fail;
    }

    pub(crate) fn stored_messages(&self, id: ConversationId) -> Vec<Message> {
        let state = self.state.lock().unwrap();
        state
            .conversations
            .get(&id)
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub(crate) fn conversation_count(&self) -> usize {
        self.state.lock().unwrap().conversations.len()
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub(crate) fn load_calls(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub(crate) fn append_calls(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

fn new_conversation(id: ConversationId, title: &str) -> Conversation {
    Conversation {
        id,
        title: Some(title.to_string()),
        messages: Vec::new(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: None,
    }
}

#[async_trait]
impl ConversationService for MockConversationService {
    async fn create_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        let id = ConversationId(state.next_conversation_id);
        state.next_conversation_id += 1;
        let conversation = new_conversation(id, title.unwrap_or("New Chat"));
        state.conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn list_conversations(&self, active_only: bool) -> Result<Vec<Conversation>> {
        self.simulate_latency().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .conversations
            .values()
            .filter(|c| !active_only || c.is_active)
            .map(|c| Conversation {
                messages: Vec::new(),
                ..c.clone()
            })
            .collect())
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        if state.failing_loads > 0 {
            state.failing_loads -= 1;
            return Err(SearchifyError::network("connection reset"));
        }
        state
            .conversations
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
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_appends {
            return Err(SearchifyError::http(503, "Service Unavailable"));
        }
        if !state.conversations.contains_key(&id) {
            return Err(SearchifyError::not_found("Conversation", id.to_string()));
        }

        let mut batch = vec![Message::durable(
            state.next_message_id,
            role,
            content,
            Utc::now(),
        )];
        state.next_message_id += 1;

        let reply = match (&state.reply, role) {
            (Reply::Placeholder, MessageRole::User) => Some(DEFAULT_PLACEHOLDER_MARKERS[0].to_string()),
            (Reply::Answer(answer), MessageRole::User) => Some(answer.clone()),
            _ => None,
        };
        if let Some(reply) = reply {
            batch.push(Message::durable(
                state.next_message_id,
                MessageRole::Assistant,
                reply,
                Utc::now(),
            ));
            state.next_message_id += 1;
        }

        if let Some(conversation) = state.conversations.get_mut(&id) {
            conversation.messages.extend(batch.iter().cloned());
        }
        Ok(batch)
    }

    async fn delete_conversation(&self, id: ConversationId, _permanent: bool) -> Result<()> {
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        state
            .conversations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| SearchifyError::not_found("Conversation", id.to_string()))
    }

    async fn update_conversation(
        &self,
        id: ConversationId,
        update: &ConversationUpdate,
    ) -> Result<Conversation> {
        self.simulate_latency().await;
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .get_mut(&id)
            .ok_or_else(|| SearchifyError::not_found("Conversation", id.to_string()))?;
        if let Some(title) = &update.title {
            conversation.title = Some(title.clone());
        }
        if let Some(is_active) = update.is_active {
            conversation.is_active = is_active;
        }
        Ok(Conversation {
            messages: Vec::new(),
            ..conversation.clone()
        })
    }
}
