//! Domain models.

pub mod history;
pub mod item;
pub mod pagination;
pub mod stock;
pub mod user;

pub use history::{Disposal, Movement, NewDisposal, NewMovement};
pub use item::{DEFAULT_CATEGORY, DEFAULT_CONDITION, Item, ItemDetails};
pub use pagination::{Page, Pagination};
pub use stock::{ItemStock, Location, LocationStockLine, StockCell, StockLine};
pub use user::{CurrentUser, User, keys as session_keys};
