use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::money::Money;
use crate::errors::ValidationError;

/// Ceiling on a single preference request, roughly 10M COP. Mirrors the
/// gateway-side limit so oversized carts fail before the network call.
pub const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(999_999_999, 0, 0, false, 0);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity { item_id: self.id.clone() });
        }
        if !self.unit_price.is_positive() {
            return Err(ValidationError::NonPositiveUnitPrice { item_id: self.id.clone() });
        }
        Ok(())
    }
}

/// Derived order total: Σ(quantity × unit_price), two decimal places.
/// Never stored independently of the items it came from.
pub fn order_total(items: &[CartItem]) -> Money {
    items.iter().map(CartItem::line_total).sum()
}

pub fn validate_items(items: &[CartItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::EmptyItems);
    }
    for item in items {
        item.validate()?;
    }
    let total = order_total(items);
    if total.amount() > MAX_ORDER_TOTAL {
        return Err(ValidationError::TotalTooLarge { total: total.amount().to_string() });
    }
    Ok(())
}
