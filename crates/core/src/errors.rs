use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::flow::FlowStatus;

/// Malformed input caught at the boundary. Never retried, surfaced to the
/// caller immediately.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("not a valid Colombian phone number: {raw}")]
    InvalidPhone { raw: String },
    #[error("payment flow requires at least one item")]
    EmptyItems,
    #[error("item {item_id} has zero quantity")]
    ZeroQuantity { item_id: String },
    #[error("item {item_id} has a non-positive unit price")]
    NonPositiveUnitPrice { item_id: String },
    #[error("order total {total} COP exceeds the maximum allowed amount")]
    TotalTooLarge { total: String },
    #[error("conversation {conversation_id} already has active payment flow {flow_id}")]
    ActiveFlowExists { conversation_id: String, flow_id: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid flow transition from {from:?} to {to:?}")]
    InvalidFlowTransition { from: FlowStatus, to: FlowStatus },
}

/// Failure reported by the payment gateway (MercadoPago). Propagated
/// unchanged from flow initiation so callers can distinguish cause.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("gateway error {code}: {message}")]
pub struct GatewayError {
    pub code: String,
    pub http_status: Option<u16>,
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl GatewayError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            http_status: None,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_http_status(mut self, http_status: u16) -> Self {
        self.http_status = Some(http_status);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Failure reported by the WhatsApp messaging channel (Bird).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("messaging error {code}: {message}")]
pub struct MessagingError {
    pub code: String,
    pub http_status: Option<u16>,
    pub message: String,
}

impl MessagingError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), http_status: None, message: message.into() }
    }

    pub fn with_http_status(mut self, http_status: u16) -> Self {
        self.http_status = Some(http_status);
        self
    }
}

/// Tagged cause model for orchestrator operations. Validation, gateway and
/// messaging causes pass through unchanged; anything unclassified lands in
/// `Other`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error("store failure: {0}")]
    Store(String),
    #[error("orchestration failure: {0}")]
    Other(String),
}

impl OrchestrationError {
    /// Whether the cause is a caller mistake rather than an infrastructure
    /// failure. Webhook and HTTP layers map this to a 4xx.
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Domain(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayError, OrchestrationError, ValidationError};

    #[test]
    fn gateway_cause_passes_through_unchanged() {
        let gateway = GatewayError::new("preference_create_failed", "upstream 502")
            .with_http_status(502)
            .with_detail("endpoint", "/checkout/preferences");
        let wrapped = OrchestrationError::from(gateway.clone());

        assert_eq!(wrapped, OrchestrationError::Gateway(gateway));
        assert_eq!(wrapped.to_string(), "gateway error preference_create_failed: upstream 502");
        assert!(!wrapped.is_caller_fault());
    }

    #[test]
    fn validation_cause_is_caller_fault() {
        let wrapped = OrchestrationError::from(ValidationError::EmptyItems);
        assert!(wrapped.is_caller_fault());
    }
}
