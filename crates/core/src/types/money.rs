//! Monetary amounts using decimal arithmetic.
//!
//! All prices in the store are in a single currency, so [`Money`] is a thin
//! wrapper around [`Decimal`] that rounds to cents and formats for display.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing [`Money`] from user input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("amount cannot have more than 2 decimal places")]
    TooPrecise,
    /// The input is not a number.
    #[error("invalid amount: {0}")]
    Invalid(String),
}

/// A non-negative amount of money, stored with cent precision.
///
/// Serializes as a decimal string (`"12.50"`) so no precision is lost in
/// JSON round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount, rounding half away from zero to cents.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Build an amount from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Validate an amount supplied by a client.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Negative` for amounts below zero and
    /// `MoneyError::TooPrecise` for fractions of a cent.
    pub fn parse_input(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        if amount.normalize().scale() > 2 {
            return Err(MoneyError::TooPrecise);
        }
        Ok(Self::new(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }

    /// Subtract, returning `None` if the result would be negative.
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        let result = self.0 - other.0;
        (!result.is_sign_negative() || result.is_zero()).then_some(Self(result))
    }

    /// Format for display with a currency symbol and thousands separators,
    /// e.g. `$1,234.50`.
    #[must_use]
    pub fn display(&self) -> String {
        let fixed = format!("{:.2}", self.0);
        let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
        let (sign, digits) = whole
            .strip_prefix('-')
            .map_or(("", whole), |rest| ("-", rest));

        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }

        format!("{sign}${grouped}.{cents}")
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::str::FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = s
            .trim()
            .parse::<Decimal>()
            .map_err(|e| MoneyError::Invalid(e.to_string()))?;
        Self::parse_input(amount)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rounds_to_cents() {
        let m = Money::new(Decimal::new(12_345, 3)); // 12.345
        assert_eq!(m.amount(), Decimal::new(1235, 2));
    }

    #[test]
    fn test_times_and_sum() {
        let bag = Money::from_cents(1_299);
        let total: Money = [bag.times(3), Money::from_cents(1)].into_iter().sum();
        assert_eq!(total, Money::from_cents(3_898));
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_cents(0).display(), "$0.00");
        assert_eq!(Money::from_cents(999).display(), "$9.99");
        assert_eq!(Money::from_cents(123_450).display(), "$1,234.50");
        assert_eq!(Money::from_cents(100_000_000).display(), "$1,000,000.00");
    }

    #[test]
    fn test_parse_input_rejects_negative_and_fractional_cents() {
        assert_eq!(
            Money::parse_input(Decimal::new(-1, 0)),
            Err(MoneyError::Negative)
        );
        assert_eq!(
            Money::parse_input(Decimal::new(1_001, 3)),
            Err(MoneyError::TooPrecise)
        );
        assert!(Money::parse_input(Decimal::new(1_000, 3)).is_ok());
    }

    #[test]
    fn test_checked_sub() {
        let a = Money::from_cents(500);
        let b = Money::from_cents(200);
        assert_eq!(a.checked_sub(b), Some(Money::from_cents(300)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(a.checked_sub(a), Some(Money::ZERO));
    }

    #[test]
    fn test_from_str() {
        let m: Money = "25.5".parse().unwrap();
        assert_eq!(m, Money::from_cents(2_550));
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_cents(1_050)).unwrap();
        assert_eq!(json, "\"10.50\"");
    }
}
