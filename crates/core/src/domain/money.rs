use std::iter::Sum;
use std::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A COP amount held to two decimal places. All arithmetic re-rounds so
/// that derived totals cannot drift from their inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp(2))
    }

    pub fn from_minor_units(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money::new(self.0 + rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, rhs: u32) -> Money {
        Money::new(self.0 * Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::Money;

    #[test]
    fn amounts_are_held_to_two_decimal_places() {
        let money = Money::new(Decimal::new(4_999_995, 5)); // 49.99995
        assert_eq!(money.amount(), Decimal::new(5_000, 2));
    }

    #[test]
    fn multiplication_and_sum_round_consistently() {
        let unit = Money::from_minor_units(5_000_000); // 50,000.00 COP
        let total: Money = [unit * 2, Money::ZERO].into_iter().sum();
        assert_eq!(total, Money::from_minor_units(10_000_000));
    }
}
