//! Durable backends for the GCN event tables.
//!
//! [`CsvTables`] keeps one human-inspectable CSV file per table and rewrites
//! it on every commit. [`SqliteTables`] wraps [`tokio_rusqlite`] so database
//! access runs on a dedicated thread without blocking the async runtime.

mod encode;
mod flat;
mod schema;
mod sqlite;

pub mod error;

pub use error::{Error, Result};
pub use flat::CsvTables;
pub use sqlite::SqliteTables;
