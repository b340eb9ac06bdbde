//! Lineage domain models
//!
//! - `DatasetIdentifier` / `JobIdentifier`: validated value objects
//! - `LineageEvent`: one pipeline action, immutable after construction
//! - `LineageEdge`: derived dataset → dataset dependency, keyed by `EdgeKey`
//! - `Metadata`: typed key-value map used for event metadata and dataset facets

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StorageError};

// ═══════════════════════════════════════════════════════════════════════════
// Metadata
// ═══════════════════════════════════════════════════════════════════════════

/// A single metadata / facet value.
///
/// Serialized untagged, so `{"rows": 10, "pii": true, "owner": "etl"}`
/// round-trips through JSON without wrapper objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetadataValue::Bool(b) => serde_json::Value::Bool(*b),
            MetadataValue::Integer(n) => serde_json::Value::from(*n),
            MetadataValue::Float(f) => serde_json::Value::from(*f),
            MetadataValue::Text(s) => serde_json::Value::String(s.clone()),
            MetadataValue::List(items) => {
                serde_json::Value::Array(items.iter().cloned().map(serde_json::Value::String).collect())
            }
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<usize> for MetadataValue {
    fn from(v: usize) -> Self {
        MetadataValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::Text(v)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(v: Vec<String>) -> Self {
        MetadataValue::List(v)
    }
}

/// Ordered key-value map (deterministic serialization).
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Convert a metadata map into a JSON object.
pub fn metadata_to_json(metadata: &Metadata) -> serde_json::Value {
    serde_json::Value::Object(
        metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════

/// Kind of dataset a lineage node represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    #[default]
    Table,
    View,
    File,
    Stream,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Table => "table",
            DatasetType::View => "view",
            DatasetType::File => "file",
            DatasetType::Stream => "stream",
        }
    }
}

impl FromStr for DatasetType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(DatasetType::Table),
            "view" => Ok(DatasetType::View),
            "file" => Ok(DatasetType::File),
            "stream" => Ok(DatasetType::Stream),
            other => Err(StorageError::serialization(format!(
                "Unknown dataset type '{}'. Valid types: table, view, file, stream",
                other
            ))),
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn require_part(kind: &str, field: &str, value: impl Into<String>) -> Result<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StorageError::invalid_identifier(format!(
            "{} {} must not be empty",
            kind, field
        )));
    }
    Ok(trimmed.to_string())
}

/// Dataset identity: `namespace` + `name`.
///
/// Type and facets describe the dataset but do not take part in equality
/// or hashing, so the same table reported with different facets is still
/// the same lineage node.
///
/// # Examples
///
/// ```rust
/// use lineage_storage::domain::{DatasetIdentifier, DatasetType};
///
/// let orders = DatasetIdentifier::from_fqn("db.orders", DatasetType::Table).unwrap();
/// assert_eq!(orders.namespace(), "db");
/// assert_eq!(orders.name(), "orders");
/// assert_eq!(orders.fqn(), "db.orders");
///
/// assert!(DatasetIdentifier::from_fqn("orders", DatasetType::Table).is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DatasetIdentifierRepr")]
pub struct DatasetIdentifier {
    namespace: String,
    name: String,
    #[serde(rename = "type")]
    dataset_type: DatasetType,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    facets: Metadata,
}

#[derive(Deserialize)]
struct DatasetIdentifierRepr {
    namespace: String,
    name: String,
    #[serde(rename = "type", default)]
    dataset_type: DatasetType,
    #[serde(default)]
    facets: Metadata,
}

impl TryFrom<DatasetIdentifierRepr> for DatasetIdentifier {
    type Error = StorageError;

    fn try_from(repr: DatasetIdentifierRepr) -> Result<Self> {
        Ok(DatasetIdentifier::new(repr.namespace, repr.name, repr.dataset_type)?
            .with_facets(repr.facets))
    }
}

impl DatasetIdentifier {
    /// Create a dataset identifier, rejecting blank namespace or name
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        dataset_type: DatasetType,
    ) -> Result<Self> {
        Ok(Self {
            namespace: require_part("dataset", "namespace", namespace)?,
            name: require_part("dataset", "name", name)?,
            dataset_type,
            facets: Metadata::new(),
        })
    }

    /// Shorthand for a `table` dataset
    pub fn table(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        Self::new(namespace, name, DatasetType::Table)
    }

    /// Parse `namespace.name`, splitting at the first `.`
    ///
    /// `db.schema.orders` yields namespace `db`, name `schema.orders`.
    pub fn from_fqn(fqn: &str, dataset_type: DatasetType) -> Result<Self> {
        match fqn.trim().split_once('.') {
            Some((namespace, name)) => Self::new(namespace, name, dataset_type),
            None => Err(StorageError::invalid_identifier(format!(
                "'{}' is not a fully-qualified name (expected namespace.name)",
                fqn
            ))),
        }
    }

    pub fn with_facet(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.facets.insert(key.into(), value.into());
        self
    }

    pub fn with_facets(mut self, facets: Metadata) -> Self {
        self.facets.extend(facets);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset_type(&self) -> DatasetType {
        self.dataset_type
    }

    pub fn facets(&self) -> &Metadata {
        &self.facets
    }

    /// Fully-qualified name (`namespace.name`)
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// True when this identifier names `namespace.name`
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.name == name
    }
}

impl PartialEq for DatasetIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl Eq for DatasetIdentifier {}

impl Hash for DatasetIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for DatasetIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Job identity: `namespace` + `name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "JobIdentifierRepr")]
pub struct JobIdentifier {
    namespace: String,
    name: String,
}

#[derive(Deserialize)]
struct JobIdentifierRepr {
    namespace: String,
    name: String,
}

impl TryFrom<JobIdentifierRepr> for JobIdentifier {
    type Error = StorageError;

    fn try_from(repr: JobIdentifierRepr) -> Result<Self> {
        JobIdentifier::new(repr.namespace, repr.name)
    }
}

impl JobIdentifier {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            namespace: require_part("job", "namespace", namespace)?,
            name: require_part("job", "name", name)?,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fqn(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    JobStarted,
    JobCompleted,
    JobFailed,
    DatasetCreated,
    DatasetUpdated,
    DatasetDeleted,
    ColumnMasked,
    ScanCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::JobStarted => "JOB_STARTED",
            EventType::JobCompleted => "JOB_COMPLETED",
            EventType::JobFailed => "JOB_FAILED",
            EventType::DatasetCreated => "DATASET_CREATED",
            EventType::DatasetUpdated => "DATASET_UPDATED",
            EventType::DatasetDeleted => "DATASET_DELETED",
            EventType::ColumnMasked => "COLUMN_MASKED",
            EventType::ScanCompleted => "SCAN_COMPLETED",
        }
    }
}

impl FromStr for EventType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "JOB_STARTED" => Ok(EventType::JobStarted),
            "JOB_COMPLETED" => Ok(EventType::JobCompleted),
            "JOB_FAILED" => Ok(EventType::JobFailed),
            "DATASET_CREATED" => Ok(EventType::DatasetCreated),
            "DATASET_UPDATED" => Ok(EventType::DatasetUpdated),
            "DATASET_DELETED" => Ok(EventType::DatasetDeleted),
            "COLUMN_MASKED" => Ok(EventType::ColumnMasked),
            "SCAN_COMPLETED" => Ok(EventType::ScanCompleted),
            other => Err(StorageError::serialization(format!(
                "Invalid event type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which producer family emitted the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Etl,
    Scan,
    ApiOperation,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Etl => "ETL",
            EventSource::Scan => "SCAN",
            EventSource::ApiOperation => "API_OPERATION",
        }
    }
}

impl FromStr for EventSource {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ETL" => Ok(EventSource::Etl),
            "SCAN" => Ok(EventSource::Scan),
            "API_OPERATION" => Ok(EventSource::ApiOperation),
            other => Err(StorageError::serialization(format!(
                "Invalid event source: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One pipeline action (ETL run, scan, dataset operation).
///
/// Built once by a producer and moved through the queue into the store;
/// nothing downstream mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEvent {
    pub event_id: String,
    pub event_type: EventType,
    pub event_time: DateTime<Utc>,
    pub source: EventSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub input_datasets: Vec<DatasetIdentifier>,
    #[serde(default)]
    pub output_datasets: Vec<DatasetIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl LineageEvent {
    pub fn builder(event_type: EventType, source: EventSource) -> LineageEventBuilder {
        LineageEventBuilder::new(event_type, source)
    }

    /// Events with at least one input and one output produce edges
    pub fn has_lineage(&self) -> bool {
        !self.input_datasets.is_empty() && !self.output_datasets.is_empty()
    }

    pub fn job_name(&self) -> Option<&str> {
        self.job.as_ref().map(JobIdentifier::name)
    }
}

/// Builder for [`LineageEvent`]
#[derive(Debug, Clone)]
pub struct LineageEventBuilder {
    event_id: Option<String>,
    event_type: EventType,
    event_time: Option<DateTime<Utc>>,
    source: EventSource,
    job: Option<JobIdentifier>,
    run_id: Option<String>,
    inputs: Vec<DatasetIdentifier>,
    outputs: Vec<DatasetIdentifier>,
    transformation: Option<String>,
    description: Option<String>,
    metadata: Metadata,
}

impl LineageEventBuilder {
    pub fn new(event_type: EventType, source: EventSource) -> Self {
        Self {
            event_id: None,
            event_type,
            event_time: None,
            source,
            job: None,
            run_id: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            transformation: None,
            description: None,
            metadata: Metadata::new(),
        }
    }

    pub fn event_id(mut self, id: impl Into<String>) -> Self {
        self.event_id = Some(id.into());
        self
    }

    pub fn event_time(mut self, time: DateTime<Utc>) -> Self {
        self.event_time = Some(time);
        self
    }

    pub fn job(mut self, job: JobIdentifier) -> Self {
        self.job = Some(job);
        self
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn input(mut self, dataset: DatasetIdentifier) -> Self {
        self.inputs.push(dataset);
        self
    }

    pub fn inputs(mut self, datasets: impl IntoIterator<Item = DatasetIdentifier>) -> Self {
        self.inputs.extend(datasets);
        self
    }

    pub fn output(mut self, dataset: DatasetIdentifier) -> Self {
        self.outputs.push(dataset);
        self
    }

    pub fn outputs(mut self, datasets: impl IntoIterator<Item = DatasetIdentifier>) -> Self {
        self.outputs.extend(datasets);
        self
    }

    pub fn transformation(mut self, transformation: impl Into<String>) -> Self {
        self.transformation = Some(transformation.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> LineageEvent {
        LineageEvent {
            event_id: self.event_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            event_type: self.event_type,
            event_time: self.event_time.unwrap_or_else(Utc::now),
            source: self.source,
            job: self.job,
            run_id: self.run_id,
            input_datasets: self.inputs,
            output_datasets: self.outputs,
            transformation: self.transformation,
            description: self.description,
            metadata: self.metadata,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Edges
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    #[default]
    DataFlow,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::DataFlow => "data_flow",
        }
    }
}

impl FromStr for EdgeType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "data_flow" => Ok(EdgeType::DataFlow),
            other => Err(StorageError::serialization(format!(
                "Invalid edge type: {}",
                other
            ))),
        }
    }
}

/// Edge identity: (source namespace, source name, target namespace, target name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source_namespace: String,
    pub source_name: String,
    pub target_namespace: String,
    pub target_name: String,
}

impl EdgeKey {
    pub fn new(source: &DatasetIdentifier, target: &DatasetIdentifier) -> Self {
        Self {
            source_namespace: source.namespace().to_string(),
            source_name: source.name().to_string(),
            target_namespace: target.namespace().to_string(),
            target_name: target.name().to_string(),
        }
    }
}

/// Directed dataset → dataset dependency derived from events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEdge {
    pub source: DatasetIdentifier,
    pub target: DatasetIdentifier,
    #[serde(default)]
    pub edge_type: EdgeType,
    #[serde(default)]
    pub transformation: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl LineageEdge {
    pub fn new(source: DatasetIdentifier, target: DatasetIdentifier) -> Self {
        Self {
            source,
            target,
            edge_type: EdgeType::DataFlow,
            transformation: None,
            description: None,
            metadata: Metadata::new(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.source, &self.target)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
