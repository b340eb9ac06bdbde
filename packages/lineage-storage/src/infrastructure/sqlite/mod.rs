//! SQLite adapter for LineageStore
//!
//! - `schema`: table/index DDL (idempotent)
//! - `store`: `LineageStore` implementation
//!
//! Edge upserts use `INSERT ... ON CONFLICT DO UPDATE`, so two writers
//! sharing one database file cannot lose each other's edge updates.

mod schema;
mod store;

pub use store::SqliteLineageStore;
