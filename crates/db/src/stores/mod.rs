use async_trait::async_trait;
use thiserror::Error;

use pagoflow_core::{ConversationContext, ConversationId, FlowId, PaymentFlow};

pub mod conversation;
pub mod flow;
pub mod memory;

pub use conversation::SqlConversationStore;
pub use flow::SqlPaymentFlowStore;
pub use memory::{InMemoryConversationStore, InMemoryPaymentFlowStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Persistence for `PaymentFlow` records keyed by flow id, with a
/// secondary lookup by the gateway payment id. Per-record writes are
/// last-writer-wins; the orchestrator holds one record for at most the
/// duration of a single operation.
#[async_trait]
pub trait PaymentFlowStore: Send + Sync {
    async fn put(&self, flow: &PaymentFlow) -> Result<(), StoreError>;
    async fn update(&self, flow: &PaymentFlow) -> Result<(), StoreError>;
    async fn get(&self, flow_id: &FlowId) -> Result<Option<PaymentFlow>, StoreError>;
    async fn get_by_payment_id(&self, payment_id: &str)
        -> Result<Option<PaymentFlow>, StoreError>;
}

/// Persistence for conversation contexts keyed by conversation id.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: &ConversationId) -> Result<Option<ConversationContext>, StoreError>;
    async fn put(&self, context: &ConversationContext) -> Result<(), StoreError>;
}
