//! Normalized storage location names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`LocationName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationNameError {
    /// The input is empty after trimming.
    #[error("location name cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("location name must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A location name in its canonical form.
///
/// Names are trimmed and title-cased: a letter that follows a non-letter (or
/// starts the string) is upper-cased, every other letter is lower-cased.
/// Two inputs that normalize to the same string refer to the same location.
///
/// ## Examples
///
/// ```
/// use stockroom_core::LocationName;
///
/// let name = LocationName::parse("  main HALL ").unwrap();
/// assert_eq!(name.as_str(), "Main Hall");
///
/// assert_eq!(LocationName::parse("st. mary's").unwrap().as_str(), "St. Mary'S");
/// assert!(LocationName::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LocationName(String);

impl LocationName {
    /// Maximum length of a location name, in characters.
    pub const MAX_LENGTH: usize = 100;

    /// Parse and normalize a location name.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, LocationNameError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LocationNameError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(LocationNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(title_case(trimmed)))
    }

    /// Returns the normalized name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `LocationName` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_alpha = true;
        } else {
            out.push(c);
            prev_is_alpha = false;
        }
    }
    out
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LocationName {
    type Err = LocationNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for LocationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
