//! Domain layer for lineage storage
//!
//! # Domain Models
//!
//! - `DatasetIdentifier`, `JobIdentifier`: validated identities
//! - `LineageEvent`: immutable pipeline action
//! - `LineageEdge`: upsertable dataset dependency
//!
//! # Port Trait
//!
//! - `LineageStore`: event log + edge table abstraction
//!
//! # Examples
//!
//! ```rust,ignore
//! use lineage_storage::domain::*;
//!
//! async fn example(store: impl LineageStore) -> Result<()> {
//!     let event = LineageEvent::builder(EventType::JobCompleted, EventSource::Etl)
//!         .input(DatasetIdentifier::table("db", "orders")?)
//!         .output(DatasetIdentifier::table("db", "orders_clean")?)
//!         .build();
//!     store.insert_events(&[event]).await?;
//!
//!     let downstream = store.find_edges_by_source("db", "orders").await?;
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod ports;

pub use models::{
    metadata_to_json, DatasetIdentifier, DatasetType, EdgeKey, EdgeType, EventSource, EventType,
    JobIdentifier, LineageEdge, LineageEvent, LineageEventBuilder, Metadata, MetadataValue,
};
pub use ports::{BatchCommit, LineageStore, StoreStats};
