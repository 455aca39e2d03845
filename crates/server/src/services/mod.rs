//! Business logic over the database layer.
//!
//! - [`ledger`] - Transactional stock operations
//! - [`auth`] - Password login, lockout and user registration
//! - [`import`] - Bulk CSV import
//! - [`export`] - CSV/zip exports and import templates

pub mod auth;
pub mod export;
pub mod import;
pub mod ledger;
