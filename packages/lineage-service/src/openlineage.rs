//! OpenLineage export
//!
//! Maps persisted events onto the OpenLineage `RunEvent` JSON shape:
//!
//! ```json
//! {
//!   "eventType": "COMPLETE",
//!   "eventTime": "2024-05-01T10:00:00Z",
//!   "run": {"runId": "..."},
//!   "job": {"namespace": "etl", "name": "etl1"},
//!   "inputs": [{"namespace": "db", "name": "orders", "facets": {}}],
//!   "outputs": [...],
//!   "producer": "...",
//!   "schemaURL": "..."
//! }
//! ```
//!
//! Dataset metadata travels as one custom facet, `lineage_metadata`,
//! carrying the required `_producer` and `_schemaURL` fields next to the
//! metadata entries.

use chrono::SecondsFormat;
use lineage_storage::{
    metadata_to_json, DatasetIdentifier, EventSource, EventType, LineageEvent, LineageStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::config::LineageConfig;
use crate::query::QueryOutcome;

pub const OPENLINEAGE_SCHEMA_URL: &str =
    "https://openlineage.io/spec/2-0-2/OpenLineage.json#/$defs/RunEvent";

pub const DATASET_FACET_SCHEMA_URL: &str =
    "https://openlineage.io/spec/2-0-2/OpenLineage.json#/$defs/DatasetFacet";

/// Key of the custom facet holding dataset metadata
pub const METADATA_FACET: &str = "lineage_metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Start,
    Running,
    Complete,
    Abort,
    Fail,
    Other,
}

impl From<EventType> for RunState {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::JobStarted => RunState::Start,
            EventType::JobCompleted | EventType::ScanCompleted => RunState::Complete,
            EventType::JobFailed => RunState::Fail,
            _ => RunState::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub event_type: RunState,
    pub event_time: String,
    pub run: Run,
    pub job: Job,
    pub inputs: Vec<Dataset>,
    pub outputs: Vec<Dataset>,
    pub producer: String,
    #[serde(rename = "schemaURL")]
    pub schema_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub facets: Map<String, Value>,
}

impl Dataset {
    /// No facets at all when the dataset carries no metadata
    pub fn from_identifier(dataset: &DatasetIdentifier, producer: &str) -> Self {
        let mut facets = Map::new();
        if let Value::Object(fields) = metadata_to_json(dataset.facets()) {
            if !fields.is_empty() {
                let mut facet = Map::new();
                facet.insert("_producer".to_string(), Value::from(producer));
                facet.insert("_schemaURL".to_string(), Value::from(DATASET_FACET_SCHEMA_URL));
                facet.extend(fields);
                facets.insert(METADATA_FACET.to_string(), Value::Object(facet));
            }
        }

        Self {
            namespace: dataset.namespace().to_string(),
            name: dataset.name().to_string(),
            facets,
        }
    }
}

/// Stateless translator from the event log to OpenLineage
pub struct OpenLineageExporter {
    store: Arc<dyn LineageStore>,
    producer: String,
    etl_namespace: String,
    scan_namespace: String,
    api_namespace: String,
}

impl OpenLineageExporter {
    pub fn new(store: Arc<dyn LineageStore>, config: &LineageConfig) -> Self {
        Self {
            store,
            producer: config.producer.clone(),
            etl_namespace: config.etl_namespace.clone(),
            scan_namespace: config.scan_namespace.clone(),
            api_namespace: config.api_namespace.clone(),
        }
    }

    /// The `limit` most recent events, newest first
    pub async fn to_openlineage_events(&self, limit: usize) -> QueryOutcome<Vec<RunEvent>> {
        match self.store.find_recent_events(limit).await {
            Ok(events) => QueryOutcome::from_list(events.iter().map(|e| self.to_run_event(e)).collect()),
            Err(e) => {
                warn!(limit, error = %e, "OpenLineage export failed");
                QueryOutcome::StoreUnavailable(e.to_string())
            }
        }
    }

    /// Events without a job are reported under their source's namespace
    /// with the source as job name; events without a run use their id.
    pub fn to_run_event(&self, event: &LineageEvent) -> RunEvent {
        let job = match &event.job {
            Some(job) => Job {
                namespace: job.namespace().to_string(),
                name: job.name().to_string(),
            },
            None => Job {
                namespace: self.namespace_for(event.source).to_string(),
                name: event.source.as_str().to_lowercase(),
            },
        };

        RunEvent {
            event_type: event.event_type.into(),
            event_time: event.event_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            run: Run {
                run_id: event
                    .run_id
                    .clone()
                    .unwrap_or_else(|| event.event_id.clone()),
            },
            job,
            inputs: self.datasets(&event.input_datasets),
            outputs: self.datasets(&event.output_datasets),
            producer: self.producer.clone(),
            schema_url: OPENLINEAGE_SCHEMA_URL.to_string(),
        }
    }

    fn datasets(&self, datasets: &[DatasetIdentifier]) -> Vec<Dataset> {
        datasets
            .iter()
            .map(|d| Dataset::from_identifier(d, &self.producer))
            .collect()
    }

    fn namespace_for(&self, source: EventSource) -> &str {
        match source {
            EventSource::Etl => &self.etl_namespace,
            EventSource::Scan => &self.scan_namespace,
            EventSource::ApiOperation => &self.api_namespace,
        }
    }
}
