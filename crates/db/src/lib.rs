pub mod connection;
pub mod migrations;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use stores::{
    ConversationStore, InMemoryConversationStore, InMemoryPaymentFlowStore, PaymentFlowStore,
    SqlConversationStore, SqlPaymentFlowStore, StoreError,
};
