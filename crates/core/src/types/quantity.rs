//! Stock quantities.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The input is not an integer.
    #[error("quantity must be a whole number")]
    NotANumber,
    /// The value is zero or negative where a positive amount is required.
    #[error("quantity must be greater than zero")]
    NotPositive,
    /// The value is negative.
    #[error("quantity cannot be negative")]
    Negative,
}

/// A strictly positive number of units.
///
/// Every ledger-mutating input (add, transfer, dispose, import) is a
/// `Quantity`; stock cells never hold zero or less.
///
/// ```
/// use stockroom_core::Quantity;
///
/// assert_eq!(Quantity::parse("12").unwrap().get(), 12);
/// assert!(Quantity::parse("0").is_err());
/// assert!(Quantity::parse("-3").is_err());
/// assert!(Quantity::parse("two").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    /// Build a quantity from an integer.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::NotPositive`] for zero or negative values.
    pub const fn new(value: i64) -> Result<Self, QuantityError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(QuantityError::NotPositive)
        }
    }

    /// Parse a positive quantity from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not an integer or not positive.
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| QuantityError::NotANumber)?;
        Self::new(value)
    }

    /// Parse an edit quantity, where zero means "remove this line".
    ///
    /// Returns `Ok(None)` for zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not an integer or is negative.
    pub fn parse_or_zero(s: &str) -> Result<Option<Self>, QuantityError> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| QuantityError::NotANumber)?;
        match value {
            0 => Ok(None),
            v if v < 0 => Err(QuantityError::Negative),
            v => Ok(Some(Self(v))),
        }
    }

    /// Returns the number of units.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Sum of two quantities, `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}
