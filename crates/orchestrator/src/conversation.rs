//! Read-modify-write helpers over the conversation store. Each call
//! loads the context, applies one mutation and writes it back; there is
//! no cross-call locking, the store's per-record last-writer-wins
//! semantics are the serialization point.

use std::sync::Arc;

use tracing::info;

use pagoflow_core::{
    CartItem, ConversationContext, ConversationId, ConversationState, OrchestrationError,
    PhoneNumber,
};
use pagoflow_db::stores::ConversationStore;

pub struct ConversationManager<C> {
    store: Arc<C>,
}

impl<C> Clone for ConversationManager<C> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<C: ConversationStore> ConversationManager<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        id: &ConversationId,
    ) -> Result<Option<ConversationContext>, OrchestrationError> {
        self.store.get(id).await.map_err(store_err)
    }

    /// Fetches the context, creating and persisting a fresh one on the
    /// first message from an unseen conversation.
    pub async fn get_or_create(
        &self,
        id: &ConversationId,
        phone: &PhoneNumber,
    ) -> Result<ConversationContext, OrchestrationError> {
        if let Some(existing) = self.store.get(id).await.map_err(store_err)? {
            return Ok(existing);
        }
        let context = ConversationContext::new(id.clone(), phone.clone());
        self.store.put(&context).await.map_err(store_err)?;
        info!(
            event_name = "conversation.created",
            conversation_id = %id,
            "new conversation context"
        );
        Ok(context)
    }

    pub async fn save(&self, context: &ConversationContext) -> Result<(), OrchestrationError> {
        self.store.put(context).await.map_err(store_err)
    }

    pub async fn update_state(
        &self,
        id: &ConversationId,
        next: ConversationState,
    ) -> Result<(), OrchestrationError> {
        self.modify(id, |context| context.set_state(next)).await
    }

    pub async fn update_last_activity(&self, id: &ConversationId) -> Result<(), OrchestrationError> {
        self.modify(id, ConversationContext::touch).await
    }

    pub async fn clear_cart(&self, id: &ConversationId) -> Result<(), OrchestrationError> {
        self.modify(id, ConversationContext::clear_cart).await
    }

    pub async fn add_cart_item(
        &self,
        id: &ConversationId,
        item: CartItem,
    ) -> Result<(), OrchestrationError> {
        self.modify(id, |context| context.add_cart_item(item)).await
    }

    /// A missing context is a silent no-op: the mutation targets state
    /// that was never created or has been cleaned up.
    async fn modify(
        &self,
        id: &ConversationId,
        apply: impl FnOnce(&mut ConversationContext),
    ) -> Result<(), OrchestrationError> {
        let Some(mut context) = self.store.get(id).await.map_err(store_err)? else {
            return Ok(());
        };
        apply(&mut context);
        self.store.put(&context).await.map_err(store_err)
    }
}

fn store_err(err: pagoflow_db::stores::StoreError) -> OrchestrationError {
    OrchestrationError::Store(err.to_string())
}
