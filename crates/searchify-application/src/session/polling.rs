//! Polling supervisor for placeholder assistant messages.
//!
//! When the service answers an append with a placeholder, the real reply is
//! produced in the background and written over the placeholder later. The
//! supervisor runs one task per placeholder that re-fetches the owning
//! conversation until the content changes or the wall-clock budget runs out.
//!
//! Interval schedule: `fast_interval_ms` for the first `fast_retries` ticks,
//! then `slow_interval_ms` until `timeout_ms` has elapsed since the start.

use super::loader::ConversationLoader;
use super::state::SessionStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use searchify_core::config::PollingConfig;
use searchify_core::conversation::{ConversationId, MessageId, PlaceholderPolicy};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

/// Identifies one poll task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollKey {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
}

impl PollKey {
    pub fn new(conversation_id: ConversationId, message_id: MessageId) -> Self {
        Self {
            conversation_id,
            message_id,
        }
    }
}

/// How a poll task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The placeholder was replaced with this content.
    Resolved { content: String, attempts: u32 },
    /// The budget ran out; the placeholder stays as it is.
    TimedOut { attempts: u32 },
    Cancelled { attempts: u32 },
}

type SharedPoll = Shared<BoxFuture<'static, PollOutcome>>;

struct PollHandle {
    cancel: CancellationToken,
    outcome: SharedPoll,
    generation: u64,
}

/// Everything a poll task needs, cloned into the task.
#[derive(Clone)]
struct PollContext {
    loader: Arc<ConversationLoader>,
    store: Arc<SessionStore>,
    policy: PlaceholderPolicy,
    config: PollingConfig,
}

/// Owns the running poll tasks of one session.
pub struct PollingSupervisor {
    context: PollContext,
    tasks: Arc<Mutex<HashMap<PollKey, PollHandle>>>,
    next_generation: AtomicU64,
}

impl PollingSupervisor {
    pub fn new(
        loader: Arc<ConversationLoader>,
        store: Arc<SessionStore>,
        policy: PlaceholderPolicy,
        config: PollingConfig,
    ) -> Self {
        Self {
            context: PollContext {
                loader,
                store,
                policy,
                config,
            },
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Starts polling a placeholder.
    ///
    /// # Returns
    ///
    /// `false` if a task for this message is already running.
    pub fn start(&self, conversation_id: ConversationId, message_id: MessageId) -> bool {
        let key = PollKey::new(conversation_id, message_id);
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.contains_key(&key) {
            tracing::debug!(
                "[PollingSupervisor] Already polling message {} of conversation {}",
                message_id,
                conversation_id
            );
            return false;
        }

        let cancel = CancellationToken::new();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let table = self.tasks.clone();
        let run = poll_until_resolved(self.context.clone(), key, cancel.clone());

        let outcome = async move {
            let outcome = run.await;
            let mut tasks = table.lock().unwrap_or_else(PoisonError::into_inner);
            if tasks
                .get(&key)
                .is_some_and(|handle| handle.generation == generation)
            {
                tasks.remove(&key);
            }
            outcome
        }
        .boxed()
        .shared();

        tasks.insert(
            key,
            PollHandle {
                cancel,
                outcome: outcome.clone(),
                generation,
            },
        );
        tokio::spawn(outcome);

        tracing::info!(
            "[PollingSupervisor] Polling placeholder {} in conversation {}",
            message_id,
            conversation_id
        );
        true
    }

    pub fn is_polling(&self, conversation_id: ConversationId, message_id: MessageId) -> bool {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.contains_key(&PollKey::new(conversation_id, message_id))
    }

    pub fn active_count(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.len()
    }

    /// Cancels every task polling the given conversation.
    ///
    /// # Returns
    ///
    /// The number of tasks cancelled.
    pub fn cancel_conversation(&self, conversation_id: ConversationId) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cancelled = 0;
        for (key, handle) in tasks.iter() {
            if key.conversation_id == conversation_id {
                handle.cancel.cancel();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!(
                "[PollingSupervisor] Cancelled {} poll task(s) for conversation {}",
                cancelled,
                conversation_id
            );
        }
        cancelled
    }

    /// Waits for a running task to finish.
    ///
    /// # Returns
    ///
    /// `None` if no task is running for this message.
    pub async fn wait(&self, key: PollKey) -> Option<PollOutcome> {
        let outcome = {
            let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.get(&key).map(|handle| handle.outcome.clone())
        }?;
        Some(outcome.await)
    }

    /// Cancels all tasks and waits until they have stopped.
    pub async fn shutdown(&self) {
        let outcomes: Vec<SharedPoll> = {
            let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks
                .values()
                .map(|handle| {
                    handle.cancel.cancel();
                    handle.outcome.clone()
                })
                .collect()
        };
        if outcomes.is_empty() {
            return;
        }
        tracing::info!(
            "[PollingSupervisor] Shutting down {} poll task(s)",
            outcomes.len()
        );
        futures::future::join_all(outcomes).await;
    }
}

impl Drop for PollingSupervisor {
    fn drop(&mut self) {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in tasks.values() {
            handle.cancel.cancel();
        }
    }
}

async fn poll_until_resolved(
    context: PollContext,
    key: PollKey,
    cancel: CancellationToken,
) -> PollOutcome {
    let PollContext {
        loader,
        store,
        policy,
        config,
    } = context;
    let deadline = Instant::now() + config.timeout();
    let mut attempts: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("[PollingSupervisor] Poll of {} cancelled", key.message_id);
                return PollOutcome::Cancelled { attempts };
            }
            _ = sleep_until(deadline) => break,
            _ = sleep(config.interval_after(attempts)) => {}
        }

        attempts += 1;
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled { attempts },
            _ = sleep_until(deadline) => break,
            fetched = loader.fetch(key.conversation_id) => fetched,
        };

        let conversation = match fetched {
            Ok(conversation) => conversation,
            Err(e) => {
                tracing::warn!(
                    "[PollingSupervisor] Poll {} of conversation {} failed: {}",
                    attempts,
                    key.conversation_id,
                    e
                );
                continue;
            }
        };

        match conversation.messages.iter().find(|m| m.id == key.message_id) {
            Some(message) if !policy.is_placeholder(message) => {
                store.resolve_placeholder(key.conversation_id, message);
                tracing::info!(
                    "[PollingSupervisor] Placeholder {} resolved after {} poll(s)",
                    key.message_id,
                    attempts
                );
                return PollOutcome::Resolved {
                    content: message.content.clone(),
                    attempts,
                };
            }
            Some(_) => {
                tracing::debug!(
                    "[PollingSupervisor] Message {} still pending (poll {})",
                    key.message_id,
                    attempts
                );
            }
            None => {
                tracing::debug!(
                    "[PollingSupervisor] Message {} missing from conversation {} (poll {})",
                    key.message_id,
                    key.conversation_id,
                    attempts
                );
            }
        }
    }

    tracing::warn!(
        "[PollingSupervisor] Gave up on placeholder {} after {} poll(s)",
        key.message_id,
        attempts
    );
    PollOutcome::TimedOut { attempts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock_service::MockConversationService;
    use searchify_core::conversation::{ConversationService, MessageRole};
    use std::time::Duration;

    fn polling(fast_retries: u32, timeout_ms: u64) -> PollingConfig {
        PollingConfig {
            fast_interval_ms: 1_000,
            fast_retries,
            slow_interval_ms: 5_000,
            timeout_ms,
        }
    }

    struct Fixture {
        service: Arc<MockConversationService>,
        store: Arc<SessionStore>,
        supervisor: PollingSupervisor,
    }

    fn fixture(config: PollingConfig) -> Fixture {
        let service = Arc::new(MockConversationService::with_placeholder_replies());
        let store = Arc::new(SessionStore::new());
        let loader = Arc::new(ConversationLoader::new(service.clone()));
        let supervisor =
            PollingSupervisor::new(loader, store.clone(), PlaceholderPolicy::default(), config);
        Fixture {
            service,
            store,
            supervisor,
        }
    }

    /// Creates a conversation whose last message is a placeholder, shown in
    /// the store.
    async fn seed(fixture: &Fixture) -> PollKey {
        let conversation = fixture.service.create_conversation(None).await.unwrap();
        let batch = fixture
            .service
            .append_message(conversation.id, MessageRole::User, "What is quantum error correction?")
            .await
            .unwrap();
        fixture.store.request(conversation.id);
        fixture.store.apply_loaded(conversation.id, batch.clone());
        PollKey::new(conversation.id, batch[1].id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolves_once_content_changes() {
        let fx = fixture(polling(3, 60_000));
        let key = seed(&fx).await;

        assert!(fx.supervisor.start(key.conversation_id, key.message_id));
        assert!(!fx.supervisor.start(key.conversation_id, key.message_id));

        let service = fx.service.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            service.resolve(key.conversation_id, key.message_id, "Final answer");
        });

        let outcome = fx.supervisor.wait(key).await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Resolved {
                content: "Final answer".to_string(),
                attempts: 3
            }
        );
        assert!(!fx.supervisor.is_polling(key.conversation_id, key.message_id));

        let snapshot = fx.store.snapshot();
        assert_eq!(snapshot.messages[1].content, "Final answer");
        assert_eq!(snapshot.messages[1].id, key.message_id);
        assert_eq!(snapshot.current_response_id, Some(key.message_id));

        // No further fetches once resolved
        let loads = fx.service.load_calls();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fx.service.load_calls(), loads);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_leaving_placeholder() {
        let fx = fixture(polling(2, 12_000));
        let key = seed(&fx).await;

        fx.supervisor.start(key.conversation_id, key.message_id);
        let outcome = fx.supervisor.wait(key).await.unwrap();

        // Ticks at 1s, 2s, then slow ticks at 7s and 12s race the deadline
        assert!(matches!(outcome, PollOutcome::TimedOut { attempts } if attempts >= 3));
        assert_eq!(
            fx.store.snapshot().messages[1].content,
            "Processing your research query..."
        );
        assert_eq!(fx.supervisor.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_count_as_retries() {
        let fx = fixture(polling(10, 60_000));
        let key = seed(&fx).await;
        fx.service.fail_next_loads(2);

        let service = fx.service.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            service.resolve(key.conversation_id, key.message_id, "Recovered");
        });

        fx.supervisor.start(key.conversation_id, key.message_id);
        let outcome = fx.supervisor.wait(key).await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Resolved {
                content: "Recovered".to_string(),
                attempts: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_conversation_stops_its_tasks() {
        let fx = fixture(polling(3, 60_000));
        let key = seed(&fx).await;
        fx.supervisor.start(key.conversation_id, key.message_id);

        assert_eq!(fx.supervisor.cancel_conversation(key.conversation_id), 1);
        let outcome = fx.supervisor.wait(key).await;
        assert!(matches!(outcome, Some(PollOutcome::Cancelled { .. }) | None));
        tokio::task::yield_now().await;
        assert_eq!(fx.supervisor.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_everything() {
        let fx = fixture(polling(3, 60_000));
        let first = seed(&fx).await;
        let second = seed(&fx).await;
        fx.supervisor.start(first.conversation_id, first.message_id);
        fx.supervisor.start(second.conversation_id, second.message_id);
        assert_eq!(fx.supervisor.active_count(), 2);

        fx.supervisor.shutdown().await;
        assert_eq!(fx.supervisor.active_count(), 0);
    }
}
