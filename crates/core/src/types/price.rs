//! Per-item price using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`UnitPrice`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number")]
    NotANumber,
    /// The value is negative.
    #[error("price cannot be negative")]
    Negative,
}

/// Price of a single unit of an item.
///
/// Stored as text so the exact decimal survives the database round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitPrice(Decimal);

impl UnitPrice {
    /// Wrap a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount))
    }

    /// Parse a price such as `"12.50"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a decimal or is negative.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| PriceError::NotANumber)?;
        Self::new(amount)
    }

    /// Returns the decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Format with two decimal places, e.g. `"12.50"`.
    #[must_use]
    pub fn display(self) -> String {
        format!("{:.2}", self.0)
    }
}

impl fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnitPrice {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price() {
        let price = UnitPrice::parse("12.5").unwrap();
        assert_eq!(price.amount(), Decimal::new(125, 1));
        assert_eq!(price.display(), "12.50");
    }

    #[test]
    fn test_zero_is_allowed() {
        assert!(UnitPrice::parse("0").is_ok());
        assert!(UnitPrice::parse("0.00").is_ok());
    }

    #[test]
    fn test_rejects_negative_and_garbage() {
        assert_eq!(UnitPrice::parse("-1"), Err(PriceError::Negative));
        assert_eq!(UnitPrice::parse("cheap"), Err(PriceError::NotANumber));
    }
}
