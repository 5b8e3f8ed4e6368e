//! Persistence gateway for the inventory tables.
//!
//! [`PersistenceGateway`] is the storage seam: handlers are written against
//! it and never see SQL. [`SqliteGateway`] is the embedded implementation,
//! one table per entity kind sharing a single connection.

mod filter;
mod sqlite;
mod traits;

pub use filter::{validate_filter, validate_key, Filter};
pub use sqlite::SqliteGateway;
pub use traits::PersistenceGateway;
