//! lineage-storage: persistence for data-pipeline lineage
//!
//! > Events are appended, edges are upserted, nothing is deleted.
//!
//! ## Core Principles
//!
//! 1. **Append-only log**: every committed event becomes a row, duplicates included
//! 2. **Edge identity**: `(source_ns, source_name, target_ns, target_name)`; upsert is last-write-wins
//! 3. **Atomic batches**: `commit_batch` writes events and edges in one transaction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lineage_storage::{InMemoryLineageStore, LineageStore};
//!
//! let store = InMemoryLineageStore::new();
//! let commit = store.commit_batch(&events, &edges).await?;
//! let outgoing = store.find_edges_by_source("db", "orders").await?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    metadata_to_json, BatchCommit, DatasetIdentifier, DatasetType, EdgeKey, EdgeType, EventSource,
    EventType, JobIdentifier, LineageEdge, LineageEvent, LineageStore, Metadata, MetadataValue,
    StoreStats,
};
pub use infrastructure::InMemoryLineageStore;

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteLineageStore;
