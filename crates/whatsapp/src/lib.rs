//! WhatsApp messaging for payment flows, delivered through the Bird
//! Business API: payment links with a pay-now button, purchase
//! confirmations, and failure notices with retry guidance.

pub mod client;
pub mod messages;
pub mod templates;

use async_trait::async_trait;

use pagoflow_core::{MessagingError, PhoneNumber};

use crate::messages::{PaymentConfirmationMessage, PaymentFailureMessage, PaymentLinkMessage};

/// Seam between the orchestrator and the WhatsApp channel. `BirdClient`
/// is the production implementation; tests substitute recording fakes.
#[async_trait]
pub trait WhatsAppMessaging: Send + Sync {
    async fn send_payment_link(
        &self,
        phone: &PhoneNumber,
        message: &PaymentLinkMessage,
    ) -> Result<(), MessagingError>;

    async fn send_payment_confirmation(
        &self,
        phone: &PhoneNumber,
        message: &PaymentConfirmationMessage,
    ) -> Result<(), MessagingError>;

    async fn send_payment_failure(
        &self,
        phone: &PhoneNumber,
        message: &PaymentFailureMessage,
    ) -> Result<(), MessagingError>;

    /// Free-form conversational reply (cart summaries, prompts).
    async fn send_text(&self, phone: &PhoneNumber, text: &str) -> Result<(), MessagingError>;
}

pub use client::BirdClient;
