// Warehouse access: a table-oriented sink with per-table write semantics.

pub mod in_memory;
pub mod traits;

#[cfg(feature = "db")]
pub mod sqlite;

pub use in_memory::InMemoryWarehouse;
pub use traits::Warehouse;

#[cfg(feature = "db")]
pub use sqlite::SqliteWarehouse;
