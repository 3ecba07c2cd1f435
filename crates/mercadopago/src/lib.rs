//! MercadoPago integration: the gateway adapter the orchestrator talks to
//! for checkout preferences, plus the payment-status taxonomy and webhook
//! notification handling that come with it.

pub mod client;
pub mod models;
pub mod status;
pub mod webhook;

use async_trait::async_trait;

use pagoflow_core::GatewayError;

use crate::models::{PaymentDetails, PreferencePayload, PreferenceRequest};

/// Seam between the orchestrator and MercadoPago. `MercadoPagoClient` is
/// the production implementation; tests substitute scripted fakes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a checkout preference and returns the data the flow needs:
    /// preference id, checkout URL, transaction id and expiration.
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferencePayload, GatewayError>;

    /// Fetches current payment status plus the raw payload for storage.
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError>;

    /// Best-effort remote cancel. `false` means the vendor refused; local
    /// cancellation proceeds regardless.
    async fn cancel_preference(&self, preference_id: &str) -> Result<bool, GatewayError>;
}

pub use client::MercadoPagoClient;
pub use status::{classify, failure_reason, PaymentStatus, PaymentStatusKind};
pub use webhook::{verify_signature, WebhookNotification};
