//! Data carried by each outbound payment message. Rendering to Spanish
//! copy lives in [`crate::templates`].

use chrono::{DateTime, Utc};
use pagoflow_core::{CartItem, Money};

#[derive(Clone, Debug)]
pub struct PaymentLinkMessage {
    pub brand_name: String,
    pub customer_name: Option<String>,
    pub items: Vec<CartItem>,
    pub total_amount: Money,
    pub checkout_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct PaymentConfirmationMessage {
    pub brand_name: String,
    pub customer_name: Option<String>,
    pub items: Vec<CartItem>,
    pub total_amount: Money,
    pub payment_id: String,
    pub approval_code: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PaymentFailureMessage {
    pub brand_name: String,
    pub customer_name: Option<String>,
    pub reason: String,
    pub retry_url: Option<String>,
    pub support_phone: String,
}
