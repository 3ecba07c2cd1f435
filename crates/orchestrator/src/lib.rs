//! Payment flow orchestration for WhatsApp conversational checkout.
//!
//! This crate is the coordination layer between the chat channel and the
//! payment gateway:
//! - **Intent classification** (`intent`) - keyword dispatch of inbound
//!   Spanish messages into payment / cart / product-inquiry intents
//! - **Conversation management** (`conversation`) - read-modify-write of
//!   persisted chat sessions (cart, state label, flow links)
//! - **Orchestration** (`orchestrator`) - the five flow operations:
//!   initiate, process status update, handle message, retry, cancel
//!
//! The orchestrator is generic over its four seams (gateway, messaging,
//! flow store, conversation store) so tests can inject scripted fakes.

pub mod conversation;
pub mod intent;
pub mod orchestrator;

pub use conversation::ConversationManager;
pub use intent::MessageIntent;
pub use orchestrator::{
    InboundMessage, MessageAction, PaymentOrchestrator, StatusUpdateOutcome,
};
