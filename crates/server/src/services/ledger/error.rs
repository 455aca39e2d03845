//! Ledger error types.

use std::fmt;

use thiserror::Error;

use stockroom_core::{DateError, LocationNameError, PriceError, QuantityError};

use crate::db::RepositoryError;

/// Kind of record a [`LedgerError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Item,
    Location,
    StockLine,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Item => "item",
            Self::Location => "location",
            Self::StockLine => "stock line",
        })
    }
}

/// Errors that can occur during stock ledger operations.
///
/// Every failure rolls back the operation's transaction; no partial writes
/// survive.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input rejected before any mutation.
    #[error("{0}")]
    InvalidArgument(String),

    /// The source cell is missing or holds less than requested.
    #[error("not enough stock: requested {requested}, available {available}")]
    InsufficientStock {
        /// Quantity the caller asked for.
        requested: i64,
        /// Quantity held at the source location.
        available: i64,
    },

    /// A referenced item, location or stock line does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: NotFoundKind, id: i64 },

    /// The actor lacks the admin flag.
    #[error("{0}")]
    Forbidden(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl LedgerError {
    /// A missing record of the given kind.
    #[must_use]
    pub const fn not_found(kind: NotFoundKind, id: i64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Whether the operation's own item is missing, as opposed to a record
    /// the submission referenced.
    #[must_use]
    pub const fn is_missing_item(&self) -> bool {
        matches!(
            self,
            Self::NotFound {
                kind: NotFoundKind::Item,
                ..
            }
        )
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

impl From<QuantityError> for LedgerError {
    fn from(e: QuantityError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<LocationNameError> for LedgerError {
    fn from(e: LocationNameError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<DateError> for LedgerError {
    fn from(e: DateError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

impl From<PriceError> for LedgerError {
    fn from(e: PriceError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}
