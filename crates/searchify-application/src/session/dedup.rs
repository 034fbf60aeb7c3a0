//! Request deduplication for in-flight service calls.
//!
//! Concurrent callers asking for the same logical operation share one
//! outcome instead of issuing duplicate network calls.

use futures::future::{BoxFuture, FutureExt, Shared};
use searchify_core::conversation::{ConversationId, MessageId, MessageRole};
use searchify_core::error::Result;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Signature of a deduplicated operation.
///
/// Two calls collapse into one only if their signatures are equal, so each
/// variant carries everything that makes a call distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKey {
    Create {
        title: String,
    },
    Load {
        id: ConversationId,
    },
    List {
        active_only: bool,
    },
    /// Appends carry the provisional id of their submission, so two genuine
    /// submissions of the same text are never merged.
    Append {
        id: ConversationId,
        role: MessageRole,
        content_hash: u64,
        submission: MessageId,
    },
}

impl OperationKey {
    pub fn append(
        id: ConversationId,
        role: MessageRole,
        content: &str,
        submission: MessageId,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        OperationKey::Append {
            id,
            role,
            content_hash: hasher.finish(),
            submission,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKey::Create { title } => write!(f, "create:{}", title),
            OperationKey::Load { id } => write!(f, "load:{}", id),
            OperationKey::List { active_only } => write!(f, "list:{}", active_only),
            OperationKey::Append {
                id,
                role,
                content_hash,
                submission,
            } => write!(
                f,
                "append:{}:{}:{:016x}:{}",
                id, role, content_hash, submission
            ),
        }
    }
}

type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T>>>;

struct InFlight<T: Clone> {
    generation: u64,
    outcome: SharedOutcome<T>,
}

/// Maps operation signatures to their pending outcome.
///
/// An entry is inserted the moment an operation is issued and removed the
/// moment it settles, before any waiter observes the result. A caller that
/// sees the result and immediately retries therefore always starts a fresh
/// call.
pub struct RequestDedup<T: Clone + Send + Sync + 'static> {
    name: &'static str,
    in_flight: Arc<Mutex<HashMap<OperationKey, InFlight<T>>>>,
    next_generation: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> RequestDedup<T> {
    /// Creates an empty dedup table; `name` only labels log lines.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Runs `operation` unless an identical one is already in flight, in
    /// which case its outcome is awaited instead.
    ///
    /// The operation is driven on its own task, so it settles (and its entry
    /// is removed) even if every caller stops waiting.
    pub async fn run<F, Fut>(&self, key: OperationKey, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let outcome = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some(existing) = in_flight.get(&key) {
                tracing::debug!("[RequestDedup:{}] Joining in-flight {}", self.name, key);
                existing.outcome.clone()
            } else {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let table = self.in_flight.clone();
                let settle_key = key.clone();
                let name = self.name;
                let pending = operation();

                let outcome = async move {
                    let result = pending.await;
                    let mut in_flight = table.lock().unwrap_or_else(PoisonError::into_inner);
                    if in_flight
                        .get(&settle_key)
                        .is_some_and(|entry| entry.generation == generation)
                    {
                        in_flight.remove(&settle_key);
                    }
                    tracing::debug!(
                        "[RequestDedup:{}] Settled {} (ok={})",
                        name,
                        settle_key,
                        result.is_ok()
                    );
                    result
                }
                .boxed()
                .shared();

                tracing::debug!("[RequestDedup:{}] Issuing {}", self.name, key);
                in_flight.insert(
                    key,
                    InFlight {
                        generation,
                        outcome: outcome.clone(),
                    },
                );
                tokio::spawn(outcome.clone());
                outcome
            }
        };

        outcome.await
    }

    /// Returns true if an operation with this signature has not settled yet.
    pub fn is_in_flight(&self, key: &OperationKey) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.len()
    }
}
