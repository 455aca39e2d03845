//! Core types for Stockroom.
//!
//! This module provides type-safe wrappers for inventory domain concepts.

pub mod date;
pub mod id;
pub mod location_name;
pub mod price;
pub mod quantity;

pub use date::{DATE_FORMAT, DateError, parse_date, parse_optional_date};
pub use id::*;
pub use location_name::{LocationName, LocationNameError};
pub use price::{PriceError, UnitPrice};
pub use quantity::{Quantity, QuantityError};
