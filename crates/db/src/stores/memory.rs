use std::collections::HashMap;

use tokio::sync::RwLock;

use pagoflow_core::{ConversationContext, ConversationId, FlowId, PaymentFlow};

use super::{ConversationStore, PaymentFlowStore, StoreError};

/// Deterministic stand-in for the SQL store. The orchestrator tests inject
/// these so flows and contexts can be inspected without a database.
#[derive(Default)]
pub struct InMemoryPaymentFlowStore {
    flows: RwLock<HashMap<String, PaymentFlow>>,
}

impl InMemoryPaymentFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PaymentFlowStore for InMemoryPaymentFlowStore {
    async fn put(&self, flow: &PaymentFlow) -> Result<(), StoreError> {
        let mut flows = self.flows.write().await;
        flows.insert(flow.flow_id.0.clone(), flow.clone());
        Ok(())
    }

    async fn update(&self, flow: &PaymentFlow) -> Result<(), StoreError> {
        self.put(flow).await
    }

    async fn get(&self, flow_id: &FlowId) -> Result<Option<PaymentFlow>, StoreError> {
        let flows = self.flows.read().await;
        Ok(flows.get(&flow_id.0).cloned())
    }

    async fn get_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<PaymentFlow>, StoreError> {
        let flows = self.flows.read().await;
        Ok(flows
            .values()
            .find(|flow| flow.payment_id.as_deref() == Some(payment_id))
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    contexts: RwLock<HashMap<String, ConversationContext>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, id: &ConversationId) -> Result<Option<ConversationContext>, StoreError> {
        let contexts = self.contexts.read().await;
        Ok(contexts.get(&id.0).cloned())
    }

    async fn put(&self, context: &ConversationContext) -> Result<(), StoreError> {
        let mut contexts = self.contexts.write().await;
        contexts.insert(context.conversation_id.0.clone(), context.clone());
        Ok(())
    }
}
