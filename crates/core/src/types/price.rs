//! Type-safe price representation using decimal arithmetic.
//!
//! The catalog publishes prices as JSON numbers (`109.95`). Parsing them into
//! [`Decimal`] keeps cart totals exact; serializing back to a JSON number
//! keeps the persisted cart readable by anything that expects the catalog
//! shape.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A price in the store's single currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// A zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents (e.g., `1999` is `$19.99`).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The amount in the currency's standard unit.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The price of `quantity` units, saturating at the representable bounds.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }
}

impl Add for Price {
    type Output = Self;

    // Saturates; a total never wraps or panics.
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Price {
    /// Format for display (e.g., "$19.99").
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0.round_dp(2))
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    // Accepts JSON numbers and decimal strings alike.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize>::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Price::from_cents(1999).to_string(), "$19.99");
        assert_eq!(Price::new(Decimal::from(20)).to_string(), "$20.00");
    }

    #[test]
    fn test_times_and_sum() {
        let shirt = Price::new(Decimal::from(20)).times(2);
        let hat = Price::new(Decimal::from(15)).times(1);
        let total: Price = [shirt, hat].into_iter().sum();
        assert_eq!(total, Price::new(Decimal::from(55)));
    }

    #[test]
    fn test_deserialize_float_is_exact() {
        let price: Price = serde_json::from_str("109.95").unwrap();
        assert_eq!(price, Price::from_cents(10995));
        assert_eq!(price.times(3), Price::from_cents(32985));
    }

    #[test]
    fn test_deserialize_integer_and_string() {
        let from_int: Price = serde_json::from_str("20").unwrap();
        let from_str: Price = serde_json::from_str("\"20.00\"").unwrap();
        assert_eq!(from_int, from_str);
    }

    #[test]
    fn test_arithmetic_saturates_at_max() {
        let max = Price::new(Decimal::MAX);
        assert_eq!(max.times(2), max);
        assert_eq!(max + Price::from_cents(1), max);
        let total: Price = [max, max, Price::from_cents(500)].into_iter().sum();
        assert_eq!(total, max);
    }

    #[test]
    fn test_deserialize_max_decimal_string() {
        let price: Price = serde_json::from_str("\"79228162514264337593543950335\"").unwrap();
        assert_eq!(price, Price::new(Decimal::MAX));
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_value(Price::from_cents(1550)).unwrap();
        assert!(json.is_number());
        assert!((json.as_f64().unwrap() - 15.5).abs() < f64::EPSILON);
    }
}
