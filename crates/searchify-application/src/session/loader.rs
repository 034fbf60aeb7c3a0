use super::dedup::{OperationKey, RequestDedup};
use searchify_core::conversation::{Conversation, ConversationId, ConversationService};
use searchify_core::error::Result;
use std::sync::Arc;

/// Fetches conversations from the service, one request per id at a time.
///
/// Both user-initiated loads and poll ticks go through here, so a reload and
/// a poll of the same conversation share a single request. The conversation
/// cache is never consulted.
pub struct ConversationLoader {
    service: Arc<dyn ConversationService>,
    fetches: RequestDedup<Conversation>,
}

impl ConversationLoader {
    pub fn new(service: Arc<dyn ConversationService>) -> Self {
        Self {
            service,
            fetches: RequestDedup::new("load"),
        }
    }

    /// Fetches a conversation with its messages.
    ///
    /// # Errors
    ///
    /// Returns the service error, shared by every concurrent caller.
    pub async fn fetch(&self, id: ConversationId) -> Result<Conversation> {
        let service = self.service.clone();
        self.fetches
            .run(OperationKey::Load { id }, move || async move {
                service.get_conversation(id).await
            })
            .await
    }

    pub fn is_fetching(&self, id: ConversationId) -> bool {
        self.fetches.is_in_flight(&OperationKey::Load { id })
    }
}
