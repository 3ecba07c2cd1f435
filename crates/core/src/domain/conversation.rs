use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerInfo;
use crate::domain::flow::FlowId;
use crate::domain::item::{order_total, CartItem};
use crate::domain::money::Money;
use crate::domain::phone::PhoneNumber;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Browsing,
    ItemSelected,
    PaymentRequested,
    PaymentPending,
    PaymentCompleted,
    PaymentFailed,
    OrderConfirmed,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browsing => "browsing",
            Self::ItemSelected => "item_selected",
            Self::PaymentRequested => "payment_requested",
            Self::PaymentPending => "payment_pending",
            Self::PaymentCompleted => "payment_completed",
            Self::PaymentFailed => "payment_failed",
            Self::OrderConfirmed => "order_confirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "browsing" => Self::Browsing,
            "item_selected" => Self::ItemSelected,
            "payment_requested" => Self::PaymentRequested,
            "payment_pending" => Self::PaymentPending,
            "payment_completed" => Self::PaymentCompleted,
            "payment_failed" => Self::PaymentFailed,
            "order_confirmed" => Self::OrderConfirmed,
            _ => return None,
        })
    }
}

/// One customer's ongoing chat: cart, state label and flow links. Created
/// lazily on the first inbound message for an unseen conversation id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: ConversationId,
    pub customer_phone: PhoneNumber,
    pub current_state: ConversationState,
    pub previous_state: Option<ConversationState>,
    #[serde(default)]
    pub customer: CustomerInfo,
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
    pub active_payment_flow: Option<FlowId>,
    /// Append-only list of every flow this conversation has started.
    #[serde(default)]
    pub payment_history: Vec<FlowId>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ConversationContext {
    pub fn new(conversation_id: ConversationId, customer_phone: PhoneNumber) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            customer_phone,
            current_state: ConversationState::Browsing,
            previous_state: None,
            customer: CustomerInfo::default(),
            cart_items: Vec::new(),
            active_payment_flow: None,
            payment_history: Vec::new(),
            created_at: now,
            last_activity: now,
            metadata: BTreeMap::new(),
        }
    }

    /// Recomputed on every call so it can never drift from the items.
    pub fn cart_total(&self) -> Money {
        order_total(&self.cart_items)
    }

    /// Cart uniqueness key is the item id: re-adding an existing id bumps
    /// its quantity instead of duplicating the line.
    pub fn add_cart_item(&mut self, item: CartItem) {
        match self.cart_items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => existing.quantity += item.quantity,
            None => self.cart_items.push(item),
        }
        self.touch();
    }

    pub fn remove_cart_item(&mut self, item_id: &str) -> bool {
        let before = self.cart_items.len();
        self.cart_items.retain(|item| item.id != item_id);
        let removed = self.cart_items.len() < before;
        if removed {
            self.touch();
        }
        removed
    }

    pub fn clear_cart(&mut self) {
        self.cart_items.clear();
        self.touch();
    }

    pub fn set_state(&mut self, next: ConversationState) {
        self.previous_state = Some(self.current_state);
        self.current_state = next;
        self.touch();
    }

    /// Links a new flow and remembers it in the append-only history.
    pub fn record_flow(&mut self, flow_id: FlowId) {
        self.payment_history.push(flow_id.clone());
        self.active_payment_flow = Some(flow_id);
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
