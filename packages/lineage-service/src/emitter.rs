//! Producer API
//!
//! Emission never blocks: an event is either queued immediately or
//! rejected with `false` when the queue is full or closed. Clones share the
//! same queue and counters.

use lineage_storage::{
    DatasetIdentifier, DatasetType, EventSource, EventType, JobIdentifier, LineageEvent,
    MetadataValue, StorageError,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::stats::IngestStats;

/// Single-dataset operation reported by API handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetOperation {
    Created,
    Updated,
    Masked,
    Deleted,
}

impl DatasetOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetOperation::Created => "created",
            DatasetOperation::Updated => "updated",
            DatasetOperation::Masked => "masked",
            DatasetOperation::Deleted => "deleted",
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            DatasetOperation::Created => EventType::DatasetCreated,
            DatasetOperation::Updated => EventType::DatasetUpdated,
            DatasetOperation::Masked => EventType::ColumnMasked,
            DatasetOperation::Deleted => EventType::DatasetDeleted,
        }
    }
}

impl FromStr for DatasetOperation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" | "create" => Ok(DatasetOperation::Created),
            "updated" | "update" => Ok(DatasetOperation::Updated),
            "masked" | "mask" => Ok(DatasetOperation::Masked),
            "deleted" | "delete" => Ok(DatasetOperation::Deleted),
            other => Err(StorageError::serialization(format!(
                "Invalid dataset operation: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DatasetOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job namespaces stamped by the convenience constructors
#[derive(Debug, Clone)]
pub struct EmitterNamespaces {
    pub etl: String,
    pub scan: String,
}

#[derive(Clone)]
pub struct LineageEmitter {
    tx: mpsc::Sender<LineageEvent>,
    stats: Arc<IngestStats>,
    namespaces: Arc<EmitterNamespaces>,
}

impl LineageEmitter {
    pub fn new(
        tx: mpsc::Sender<LineageEvent>,
        stats: Arc<IngestStats>,
        namespaces: EmitterNamespaces,
    ) -> Self {
        Self {
            tx,
            stats,
            namespaces: Arc::new(namespaces),
        }
    }

    /// Events currently waiting in the queue
    pub fn queue_size(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn queue_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Queue one event; `false` when the queue is full or closed.
    ///
    /// Acceptance does not mean a worker is running.
    pub fn emit_event(&self, event: LineageEvent) -> bool {
        let event_id = event.event_id.clone();
        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.record_received();
                trace!(event_id = %event_id, "Lineage event queued");
                true
            }
            Err(TrySendError::Full(_)) => {
                self.stats.record_failed(1);
                warn!(event_id = %event_id, capacity = self.queue_capacity(), "Lineage queue full, event rejected");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_failed(1);
                warn!(event_id = %event_id, "Lineage queue closed, event rejected");
                false
            }
        }
    }

    /// Queue each event; returns how many were accepted
    pub fn emit_batch(&self, events: impl IntoIterator<Item = LineageEvent>) -> usize {
        events
            .into_iter()
            .map(|event| self.emit_event(event))
            .filter(|accepted| *accepted)
            .count()
    }

    /// ETL job run reading `source_tables` and writing `target_tables`
    /// (both given as `namespace.name`).
    pub fn emit_etl_event<S: AsRef<str>>(
        &self,
        job_name: &str,
        source_tables: &[S],
        target_tables: &[S],
        transformation: Option<&str>,
        run_id: Option<&str>,
    ) -> bool {
        let built = self.etl_event(job_name, source_tables, target_tables, transformation, run_id);
        self.emit_built("etl", built)
    }

    /// Metadata scan of `database`; scanned tables are outputs only
    pub fn emit_scan_event<S: AsRef<str>>(
        &self,
        database: &str,
        tables_scanned: &[S],
        scan_id: Option<&str>,
    ) -> bool {
        let built = self.scan_event(database, tables_scanned, scan_id);
        self.emit_built("scan", built)
    }

    /// Operation on a single dataset (`namespace.name`)
    pub fn emit_dataset_operation(
        &self,
        operation: DatasetOperation,
        dataset_fqn: &str,
        column_name: Option<&str>,
        description: Option<&str>,
    ) -> bool {
        let built = DatasetIdentifier::from_fqn(dataset_fqn, DatasetType::Table).map(|dataset| {
            let mut builder =
                LineageEvent::builder(operation.event_type(), EventSource::ApiOperation)
                    .output(dataset)
                    .metadata("operation", operation.as_str());
            if let Some(column) = column_name {
                builder = builder.metadata("column_name", MetadataValue::from(column));
            }
            if let Some(description) = description {
                builder = builder.description(description);
            }
            builder.build()
        });

        self.emit_built("dataset_operation", built)
    }

    fn etl_event<S: AsRef<str>>(
        &self,
        job_name: &str,
        source_tables: &[S],
        target_tables: &[S],
        transformation: Option<&str>,
        run_id: Option<&str>,
    ) -> lineage_storage::Result<LineageEvent> {
        let run_id = run_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut builder = LineageEvent::builder(EventType::JobCompleted, EventSource::Etl)
            .job(JobIdentifier::new(&self.namespaces.etl, job_name)?)
            .run_id(run_id)
            .inputs(parse_tables(source_tables)?)
            .outputs(parse_tables(target_tables)?);
        if let Some(transformation) = transformation {
            builder = builder.transformation(transformation);
        }
        Ok(builder.build())
    }

    fn scan_event<S: AsRef<str>>(
        &self,
        database: &str,
        tables_scanned: &[S],
        scan_id: Option<&str>,
    ) -> lineage_storage::Result<LineageEvent> {
        let database = database.trim();
        let outputs = tables_scanned
            .iter()
            .map(|table| DatasetIdentifier::table(database, table.as_ref()))
            .collect::<lineage_storage::Result<Vec<_>>>()?;

        let mut builder = LineageEvent::builder(EventType::ScanCompleted, EventSource::Scan)
            .job(JobIdentifier::new(
                &self.namespaces.scan,
                format!("scan_{}", database),
            )?)
            .outputs(outputs)
            .description(format!(
                "Scanned {} tables in {}",
                tables_scanned.len(),
                database
            ))
            .metadata("database", database)
            .metadata("table_count", tables_scanned.len());
        if let Some(scan_id) = scan_id {
            builder = builder.run_id(scan_id);
        }
        Ok(builder.build())
    }

    fn emit_built(&self, kind: &str, built: lineage_storage::Result<LineageEvent>) -> bool {
        match built {
            Ok(event) => self.emit_event(event),
            Err(e) => {
                self.stats.record_failed(1);
                warn!(kind, error = %e, "Rejected malformed lineage event");
                false
            }
        }
    }
}

fn parse_tables<S: AsRef<str>>(tables: &[S]) -> lineage_storage::Result<Vec<DatasetIdentifier>> {
    tables
        .iter()
        .map(|fqn| DatasetIdentifier::from_fqn(fqn.as_ref(), DatasetType::Table))
        .collect()
}
