use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::conversation::ConversationId;
use crate::domain::customer::CustomerInfo;
use crate::domain::item::{order_total, CartItem};
use crate::domain::money::Money;
use crate::domain::phone::PhoneNumber;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub String);

impl FlowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Globally unique without a central sequence: conversation id plus a
    /// second-resolution timestamp plus a random suffix.
    pub fn generate(conversation_id: &ConversationId) -> Self {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("flow_{stamp}_{}_{suffix}", conversation_id.0))
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Initiated,
    PreferenceCreated,
    LinkSent,
    PaymentPending,
    PaymentApproved,
    PaymentFailed,
    Cancelled,
    Expired,
    Completed,
    Failed,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::PreferenceCreated => "preference_created",
            Self::LinkSent => "link_sent",
            Self::PaymentPending => "payment_pending",
            Self::PaymentApproved => "payment_approved",
            Self::PaymentFailed => "payment_failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "initiated" => Self::Initiated,
            "preference_created" => Self::PreferenceCreated,
            "link_sent" => Self::LinkSent,
            "payment_pending" => Self::PaymentPending,
            "payment_approved" => Self::PaymentApproved,
            "payment_failed" => Self::PaymentFailed,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => return None,
        })
    }

    pub fn bucket(&self) -> StatusBucket {
        match self {
            Self::Initiated | Self::PreferenceCreated | Self::LinkSent => {
                StatusBucket::ActivePrePayment
            }
            Self::PaymentPending => StatusBucket::AwaitingPayment,
            Self::PaymentApproved | Self::Completed => StatusBucket::Succeeded,
            Self::PaymentFailed | Self::Cancelled | Self::Expired | Self::Failed => {
                StatusBucket::Failed
            }
        }
    }

    /// Ordering inside the pre-payment bucket; transitions there only move
    /// forward.
    fn pre_payment_rank(&self) -> u8 {
        match self {
            Self::Initiated => 0,
            Self::PreferenceCreated => 1,
            Self::LinkSent => 2,
            _ => u8::MAX,
        }
    }
}

/// Exactly one bucket applies to a flow at any time. Bucket transitions are
/// monotonic: a flow never re-enters an earlier bucket, so a late `pending`
/// webhook cannot walk back an `approved` flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    ActivePrePayment,
    AwaitingPayment,
    Succeeded,
    Failed,
}

impl StatusBucket {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Result of applying a status to a flow. Regressions are deliberately a
/// no-op rather than an error: out-of-order webhooks are expected traffic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusTransition {
    Applied { from: FlowStatus, to: FlowStatus },
    Superseded { current: FlowStatus, rejected: FlowStatus },
}

impl StatusTransition {
    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// One purchase attempt: the full lifecycle from initiation through the
/// gateway preference and WhatsApp link to the terminal payment outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentFlow {
    pub flow_id: FlowId,
    pub conversation_id: ConversationId,
    pub customer_phone: PhoneNumber,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub customer: CustomerInfo,
    pub payment_id: Option<String>,
    pub transaction_id: Option<String>,
    pub checkout_url: Option<String>,
    pub status: FlowStatus,
    pub payment_status: Option<String>,
    pub payment_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Retry lineage and cancellation bookkeeping. Recorded, never
    /// interpreted by the state machine.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PaymentFlow {
    pub fn new(
        conversation_id: ConversationId,
        customer_phone: PhoneNumber,
        items: Vec<CartItem>,
        customer: CustomerInfo,
    ) -> Self {
        Self {
            flow_id: FlowId::generate(&conversation_id),
            conversation_id,
            customer_phone,
            items,
            customer,
            payment_id: None,
            transaction_id: None,
            checkout_url: None,
            status: FlowStatus::Initiated,
            payment_status: None,
            payment_data: None,
            created_at: Utc::now(),
            updated_at: None,
            expires_at: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Σ(quantity × unit_price) over the stored items, never cached.
    pub fn total_amount(&self) -> Money {
        order_total(&self.items)
    }

    pub fn is_active(&self) -> bool {
        !self.status.bucket().is_terminal()
    }

    pub fn is_completed(&self) -> bool {
        self.status.bucket() == StatusBucket::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.status.bucket() == StatusBucket::Failed
    }

    /// Records the gateway preference. Only a freshly initiated flow may
    /// take one; the fields are immutable afterwards.
    pub fn attach_preference(
        &mut self,
        payment_id: String,
        transaction_id: String,
        checkout_url: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        if self.status != FlowStatus::Initiated {
            return Err(DomainError::InvalidFlowTransition {
                from: self.status,
                to: FlowStatus::PreferenceCreated,
            });
        }
        self.payment_id = Some(payment_id);
        self.transaction_id = Some(transaction_id);
        self.checkout_url = Some(checkout_url);
        self.expires_at = expires_at;
        self.status = FlowStatus::PreferenceCreated;
        self.touch();
        Ok(())
    }

    pub fn mark_link_sent(&mut self) -> Result<(), DomainError> {
        if self.status != FlowStatus::PreferenceCreated {
            return Err(DomainError::InvalidFlowTransition {
                from: self.status,
                to: FlowStatus::LinkSent,
            });
        }
        self.status = FlowStatus::LinkSent;
        self.touch();
        Ok(())
    }

    /// Monotonic-bucket transition guard. Forward moves are applied; a
    /// status whose bucket is behind the current one, a terminal current
    /// status, or a backwards step inside the pre-payment bucket all come
    /// back as `Superseded` and leave the flow untouched.
    pub fn apply_status(&mut self, next: FlowStatus) -> StatusTransition {
        let from = self.status;
        let superseded = StatusTransition::Superseded { current: from, rejected: next };

        if from.bucket().is_terminal() {
            return superseded;
        }
        if next.bucket() < from.bucket() {
            return superseded;
        }
        if next.bucket() == from.bucket() {
            let within_pre_payment = next.bucket() == StatusBucket::ActivePrePayment
                && next.pre_payment_rank() > from.pre_payment_rank();
            // Re-asserting payment_pending is a tolerated duplicate.
            let pending_reassert = from == FlowStatus::PaymentPending && next == from;
            if !within_pre_payment && !pending_reassert {
                return superseded;
            }
        }

        self.status = next;
        self.touch();
        StatusTransition::Applied { from, to: next }
    }

    /// Explicit cancellation, reachable from any non-terminal state. A
    /// terminal flow stays as it is.
    pub fn cancel(&mut self, reason: &str) -> bool {
        if self.status.bucket().is_terminal() {
            return false;
        }
        self.status = FlowStatus::Cancelled;
        self.metadata
            .insert("cancellation_reason".to_owned(), serde_json::Value::from(reason));
        self.metadata
            .insert("cancelled_at".to_owned(), serde_json::Value::from(Utc::now().to_rfc3339()));
        self.touch();
        true
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationId;
    use crate::domain::customer::CustomerInfo;
    use crate::domain::item::CartItem;
    use crate::domain::money::Money;
    use crate::domain::phone::PhoneNumber;
    use crate::errors::DomainError;

    use super::{FlowId, FlowStatus, PaymentFlow, StatusBucket, StatusTransition};

    fn flow() -> PaymentFlow {
        PaymentFlow::new(
            ConversationId("conv-1".to_owned()),
            PhoneNumber::parse("3001234567").expect("valid phone"),
            vec![CartItem {
                id: "sku1".to_owned(),
                title: "Camisa".to_owned(),
                description: None,
                quantity: 2,
                unit_price: Money::from_minor_units(5_000_000),
            }],
            CustomerInfo::default(),
        )
    }

    fn flow_with_link_sent() -> PaymentFlow {
        let mut flow = flow();
        flow.attach_preference(
            "pref-1".to_owned(),
            "txn-1".to_owned(),
            "https://mp.example/checkout/pref-1".to_owned(),
            None,
        )
        .expect("initiated flow takes a preference");
        flow.mark_link_sent().expect("preference_created -> link_sent");
        flow
    }

    #[test]
    fn generated_ids_embed_conversation_and_are_unique() {
        let conversation = ConversationId("conv-9".to_owned());
        let first = FlowId::generate(&conversation);
        let second = FlowId::generate(&conversation);

        assert!(first.0.starts_with("flow_"));
        assert!(first.0.contains("conv-9"));
        assert_ne!(first, second);
    }

    #[test]
    fn total_is_derived_from_items() {
        assert_eq!(flow().total_amount(), Money::from_minor_units(10_000_000));
    }

    #[test]
    fn preference_can_only_attach_once() {
        let mut flow = flow_with_link_sent();
        let error = flow
            .attach_preference("pref-2".to_owned(), "txn-2".to_owned(), "url".to_owned(), None)
            .expect_err("second preference must be rejected");
        assert!(matches!(error, DomainError::InvalidFlowTransition { .. }));
        assert_eq!(flow.payment_id.as_deref(), Some("pref-1"));
    }

    #[test]
    fn forward_bucket_transitions_apply() {
        let mut flow = flow_with_link_sent();

        assert!(flow.apply_status(FlowStatus::PaymentPending).was_applied());
        assert!(flow.apply_status(FlowStatus::PaymentApproved).was_applied());
        assert_eq!(flow.status.bucket(), StatusBucket::Succeeded);
    }

    #[test]
    fn late_pending_webhook_does_not_regress_an_approved_flow() {
        let mut flow = flow_with_link_sent();
        flow.apply_status(FlowStatus::PaymentApproved);

        let outcome = flow.apply_status(FlowStatus::PaymentPending);

        assert_eq!(
            outcome,
            StatusTransition::Superseded {
                current: FlowStatus::PaymentApproved,
                rejected: FlowStatus::PaymentPending,
            }
        );
        assert_eq!(flow.status, FlowStatus::PaymentApproved);
    }

    #[test]
    fn terminal_flows_never_transition_further() {
        let mut flow = flow_with_link_sent();
        flow.apply_status(FlowStatus::PaymentFailed);

        assert!(!flow.apply_status(FlowStatus::PaymentApproved).was_applied());
        assert!(!flow.cancel("late"), "terminal flow cannot be cancelled");
        assert_eq!(flow.status, FlowStatus::PaymentFailed);
    }

    #[test]
    fn duplicate_pending_is_tolerated_and_applied() {
        let mut flow = flow_with_link_sent();
        flow.apply_status(FlowStatus::PaymentPending);
        assert!(flow.apply_status(FlowStatus::PaymentPending).was_applied());
    }

    #[test]
    fn cancel_records_reason_and_timestamp() {
        let mut flow = flow_with_link_sent();
        assert!(flow.cancel("user_cancellation"));

        assert_eq!(flow.status, FlowStatus::Cancelled);
        assert_eq!(
            flow.metadata.get("cancellation_reason").and_then(|v| v.as_str()),
            Some("user_cancellation")
        );
        assert!(flow.metadata.contains_key("cancelled_at"));
    }

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in [
            FlowStatus::Initiated,
            FlowStatus::PreferenceCreated,
            FlowStatus::LinkSent,
            FlowStatus::PaymentPending,
            FlowStatus::PaymentApproved,
            FlowStatus::PaymentFailed,
            FlowStatus::Cancelled,
            FlowStatus::Expired,
            FlowStatus::Completed,
            FlowStatus::Failed,
        ] {
            assert_eq!(FlowStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FlowStatus::parse("refunded_elsewhere"), None);
    }
}
