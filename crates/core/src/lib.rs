//! Stockroom Core - Shared domain types.
//!
//! This crate provides the types shared by every Stockroom component:
//! - `server` - The inventory web application
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and parsing rules - no I/O, no database
//! access. Database encoding for the ID types is behind the `sqlite` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, normalized location names, quantities, prices and dates

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
