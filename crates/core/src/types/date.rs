//! Calendar date input.

use chrono::NaiveDate;

/// The only accepted date format for forms and imports.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Error returned by [`parse_date`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid date {input:?}, expected YYYY-MM-DD")]
pub struct DateError {
    /// The rejected input.
    pub input: String,
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`DateError`] if the trimmed input is not a valid calendar date in
/// that format.
pub fn parse_date(s: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| DateError {
        input: s.to_owned(),
    })
}

/// Parse an optional date field where an empty string means "not given".
///
/// # Errors
///
/// Returns [`DateError`] for non-empty input that is not a valid date.
pub fn parse_optional_date(s: &str) -> Result<Option<NaiveDate>, DateError> {
    if s.trim().is_empty() {
        Ok(None)
    } else {
        parse_date(s).map(Some)
    }
}
