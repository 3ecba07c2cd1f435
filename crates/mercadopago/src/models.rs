//! Request/response shapes exchanged with the payment gateway.

use chrono::{DateTime, Utc};
use pagoflow_core::{CartItem, ConversationId, CustomerInfo, FlowId, Money, PhoneNumber};
use serde::{Deserialize, Serialize};

use crate::status::PaymentStatus;

/// Everything needed to open a hosted checkout for one payment flow.
#[derive(Clone, Debug)]
pub struct PreferenceRequest {
    pub flow_id: FlowId,
    pub conversation_id: ConversationId,
    pub customer_phone: PhoneNumber,
    pub customer: CustomerInfo,
    pub items: Vec<CartItem>,
    /// Absolute deadline for the checkout link; the client fills in a
    /// 24-hour default when absent.
    pub expires_at: Option<DateTime<Utc>>,
}

/// What came back from preference creation, reduced to the fields the
/// orchestrator stores on the flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferencePayload {
    pub preference_id: String,
    pub checkout_url: String,
    pub transaction_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A payment looked up by id after a webhook notification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    pub external_reference: Option<String>,
    pub transaction_amount: Money,
    pub approval_code: Option<String>,
    /// Full gateway response, persisted with the flow for audit.
    pub raw: serde_json::Value,
}
