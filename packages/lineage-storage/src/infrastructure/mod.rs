//! Infrastructure layer - Storage adapters
//!
//! - `memory`: in-process store for tests and embedding
//! - `sqlite`: file or in-memory SQLite (feature `sqlite`)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryLineageStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLineageStore;
