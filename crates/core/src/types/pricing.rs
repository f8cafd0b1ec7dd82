//! Order pricing rules.
//!
//! Every order stores `subtotal`, `delivery_fee`, `discount`, and `total`.
//! [`OrderTotals::compute`] is the only place these are derived, and it
//! guarantees `total = subtotal + delivery_fee - discount`.

use serde::{Deserialize, Serialize};

use crate::{DeliveryMethod, Money};

/// Errors raised while pricing an order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// No lines to price.
    #[error("order must contain at least one item")]
    Empty,
    /// A line has a zero quantity.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// The discount exceeds what the order is worth.
    #[error("discount of {discount} exceeds order value of {value}")]
    DiscountTooLarge {
        /// Requested discount.
        discount: Money,
        /// Subtotal plus delivery fee.
        value: Money,
    },
}

/// Delivery fee rules for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    /// Fee charged for delivered orders.
    pub flat_fee: Money,
    /// Subtotal at or above which delivery is free. `None` disables free delivery.
    pub free_over: Option<Money>,
}

impl DeliveryPolicy {
    /// Fee for an order with the given subtotal.
    #[must_use]
    pub fn fee_for(&self, method: DeliveryMethod, subtotal: Money) -> Money {
        match method {
            DeliveryMethod::Pickup => Money::ZERO,
            DeliveryMethod::Delivery => match self.free_over {
                Some(threshold) if subtotal >= threshold => Money::ZERO,
                _ => self.flat_fee,
            },
        }
    }
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            flat_fee: Money::from_cents(2_500),
            free_over: Some(Money::from_cents(50_000)),
        }
    }
}

/// A priced order line: unit price snapshot times quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Unit price at the time of ordering.
    pub unit_price: Money,
    /// Number of units.
    pub quantity: u32,
}

impl OrderLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Derived money fields of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Price an order.
    ///
    /// # Errors
    ///
    /// Returns `PricingError::Empty` with no lines, `PricingError::ZeroQuantity`
    /// if any line has quantity zero, and `PricingError::DiscountTooLarge` if
    /// the discount would make the total negative.
    pub fn compute(
        lines: &[OrderLine],
        method: DeliveryMethod,
        policy: &DeliveryPolicy,
        discount: Money,
    ) -> Result<Self, PricingError> {
        if lines.is_empty() {
            return Err(PricingError::Empty);
        }
        if lines.iter().any(|l| l.quantity == 0) {
            return Err(PricingError::ZeroQuantity);
        }

        let subtotal: Money = lines.iter().map(OrderLine::line_total).sum();
        let delivery_fee = policy.fee_for(method, subtotal);
        let value = subtotal + delivery_fee;
        let total = value
            .checked_sub(discount)
            .ok_or(PricingError::DiscountTooLarge { discount, value })?;

        Ok(Self {
            subtotal,
            delivery_fee,
            discount,
            total,
        })
    }

    /// Whether the stored fields are mutually consistent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.subtotal + self.delivery_fee - self.discount == self.total
            && !self.total.amount().is_sign_negative()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(cents: i64, quantity: u32) -> OrderLine {
        OrderLine {
            unit_price: Money::from_cents(cents),
            quantity,
        }
    }

    #[test]
    fn test_delivery_fee_applies_below_threshold() {
        let totals = OrderTotals::compute(
            &[line(1_250, 4)],
            DeliveryMethod::Delivery,
            &DeliveryPolicy::default(),
            Money::ZERO,
        )
        .unwrap();

        assert_eq!(totals.subtotal, Money::from_cents(5_000));
        assert_eq!(totals.delivery_fee, Money::from_cents(2_500));
        assert_eq!(totals.total, Money::from_cents(7_500));
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_free_delivery_at_threshold() {
        let totals = OrderTotals::compute(
            &[line(25_000, 2)],
            DeliveryMethod::Delivery,
            &DeliveryPolicy::default(),
            Money::ZERO,
        )
        .unwrap();
        assert_eq!(totals.delivery_fee, Money::ZERO);
        assert_eq!(totals.total, Money::from_cents(50_000));
    }

    #[test]
    fn test_pickup_is_free() {
        let totals = OrderTotals::compute(
            &[line(100, 1)],
            DeliveryMethod::Pickup,
            &DeliveryPolicy::default(),
            Money::ZERO,
        )
        .unwrap();
        assert_eq!(totals.delivery_fee, Money::ZERO);
    }

    #[test]
    fn test_discount_is_subtracted() {
        let totals = OrderTotals::compute(
            &[line(1_000, 3), line(550, 2)],
            DeliveryMethod::Delivery,
            &DeliveryPolicy::default(),
            Money::from_cents(600),
        )
        .unwrap();

        assert_eq!(totals.subtotal, Money::from_cents(4_100));
        assert_eq!(totals.total, Money::from_cents(4_100 + 2_500 - 600));
        assert!(totals.is_consistent());
    }

    #[test]
    fn test_discount_may_equal_order_value() {
        let totals = OrderTotals::compute(
            &[line(1_000, 1)],
            DeliveryMethod::Pickup,
            &DeliveryPolicy::default(),
            Money::from_cents(1_000),
        )
        .unwrap();
        assert_eq!(totals.total, Money::ZERO);
    }

    #[test]
    fn test_discount_too_large() {
        let err = OrderTotals::compute(
            &[line(1_000, 1)],
            DeliveryMethod::Pickup,
            &DeliveryPolicy::default(),
            Money::from_cents(1_001),
        )
        .unwrap_err();
        assert!(matches!(err, PricingError::DiscountTooLarge { .. }));
    }

    #[test]
    fn test_empty_and_zero_quantity() {
        let policy = DeliveryPolicy::default();
        assert_eq!(
            OrderTotals::compute(&[], DeliveryMethod::Pickup, &policy, Money::ZERO),
            Err(PricingError::Empty)
        );
        assert_eq!(
            OrderTotals::compute(&[line(100, 0)], DeliveryMethod::Pickup, &policy, Money::ZERO),
            Err(PricingError::ZeroQuantity)
        );
    }

    #[test]
    fn test_no_free_delivery_when_disabled() {
        let policy = DeliveryPolicy {
            flat_fee: Money::from_cents(4_000),
            free_over: None,
        };
        assert_eq!(
            policy.fee_for(DeliveryMethod::Delivery, Money::from_cents(10_000_000)),
            Money::from_cents(4_000)
        );
    }
}
