pub mod config;
pub mod domain;
pub mod errors;
pub mod format;

pub use domain::conversation::{ConversationContext, ConversationId, ConversationState};
pub use domain::customer::CustomerInfo;
pub use domain::flow::{FlowId, FlowStatus, PaymentFlow, StatusBucket, StatusTransition};
pub use domain::item::CartItem;
pub use domain::money::Money;
pub use domain::phone::PhoneNumber;
pub use errors::{
    DomainError, GatewayError, MessagingError, OrchestrationError, ValidationError,
};
