//! Lineage service configuration
//!
//! A config starts from a [`Preset`] and may be refined by a versioned YAML
//! file:
//!
//! ```yaml
//! version: 1
//! preset: balanced
//! overrides:
//!   batch_size: 250
//!   flush_interval_ms: 1000
//! ```
//!
//! Every loaded config is validated before use.

pub mod error;
pub mod preset;

pub use error::{ConfigError, ConfigResult};
pub use preset::Preset;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::query::DepthLimits;

/// Only supported file schema version
pub const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_PRODUCER: &str = "https://github.com/lineage-engine/lineage-service";

/// Runtime settings for the emitter, worker and query engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Bounded queue capacity (events)
    pub queue_capacity: usize,
    /// Flush once this many events are batched
    pub batch_size: usize,
    /// Flush at least this often while events are pending
    pub flush_interval_ms: u64,
    /// How long `stop()` waits for the worker before draining itself
    pub stop_timeout_ms: u64,
    /// Depth used when a caller does not pass one
    pub default_max_depth: usize,
    /// Hard ceiling for any traversal depth
    pub max_depth_limit: usize,
    /// Job namespace for ETL events
    pub etl_namespace: String,
    /// Job namespace for scan events
    pub scan_namespace: String,
    /// Job namespace for API-originated events without a job
    pub api_namespace: String,
    /// `producer` URI stamped on OpenLineage output
    pub producer: String,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self::preset(Preset::Balanced)
    }
}

impl LineageConfig {
    pub fn preset(preset: Preset) -> Self {
        let (queue_capacity, batch_size, flush_interval_ms) = match preset {
            Preset::LowLatency => (1_000, 10, 250),
            Preset::Balanced => (10_000, 100, 5_000),
            Preset::HighThroughput => (100_000, 1_000, 10_000),
        };

        Self {
            queue_capacity,
            batch_size,
            flush_interval_ms,
            stop_timeout_ms: 10_000,
            default_max_depth: 5,
            max_depth_limit: 50,
            etl_namespace: "etl".to_string(),
            scan_namespace: "scanner".to_string(),
            api_namespace: "api".to_string(),
            producer: DEFAULT_PRODUCER.to_string(),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn depth_limits(&self) -> DepthLimits {
        DepthLimits {
            default_max_depth: self.default_max_depth,
            max_depth_limit: self.max_depth_limit,
        }
    }

    /// Apply every `Some` field of the patch
    pub fn apply(&mut self, patch: LineageConfigPatch) {
        if let Some(v) = patch.queue_capacity {
            self.queue_capacity = v;
        }
        if let Some(v) = patch.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = patch.flush_interval_ms {
            self.flush_interval_ms = v;
        }
        if let Some(v) = patch.stop_timeout_ms {
            self.stop_timeout_ms = v;
        }
        if let Some(v) = patch.default_max_depth {
            self.default_max_depth = v;
        }
        if let Some(v) = patch.max_depth_limit {
            self.max_depth_limit = v;
        }
        if let Some(v) = patch.etl_namespace {
            self.etl_namespace = v;
        }
        if let Some(v) = patch.scan_namespace {
            self.scan_namespace = v;
        }
        if let Some(v) = patch.api_namespace {
            self.api_namespace = v;
        }
        if let Some(v) = patch.producer {
            self.producer = v;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range(
            "queue_capacity",
            self.queue_capacity,
            1,
            1_000_000,
            "Queue must hold at least one event",
        )?;
        check_range(
            "batch_size",
            self.batch_size,
            1,
            10_000,
            "A batch must hold at least one event",
        )?;
        check_range(
            "flush_interval_ms",
            self.flush_interval_ms,
            1,
            3_600_000,
            "Use at most one hour between flushes",
        )?;
        check_range(
            "stop_timeout_ms",
            self.stop_timeout_ms,
            1,
            600_000,
            "Shutdown wait is capped at ten minutes",
        )?;
        check_range(
            "max_depth_limit",
            self.max_depth_limit,
            1,
            1_000,
            "Deeper traversals issue one store query per node",
        )?;
        check_range(
            "default_max_depth",
            self.default_max_depth,
            1,
            self.max_depth_limit,
            "Default depth cannot exceed max_depth_limit",
        )?;

        if self.batch_size > self.queue_capacity {
            return Err(ConfigError::Validation(format!(
                "batch_size ({}) exceeds queue_capacity ({})",
                self.batch_size, self.queue_capacity
            )));
        }

        for (field, value) in [
            ("etl_namespace", &self.etl_namespace),
            ("scan_namespace", &self.scan_namespace),
            ("api_namespace", &self.api_namespace),
            ("producer", &self.producer),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{} must not be empty", field)));
            }
        }

        Ok(())
    }

    /// Load and validate a YAML config file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: LineageConfigFileV1 = serde_yaml::from_str(content)?;

        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: vec![CONFIG_VERSION],
            });
        }

        let preset = match file.preset.as_deref() {
            Some(name) => Preset::from_str(name)?,
            None => Preset::default(),
        };

        let mut config = Self::preset(preset);
        if let Some(overrides) = file.overrides {
            config.apply(overrides);
        }
        config.validate()?;
        Ok(config)
    }

    /// Export as a `balanced` preset with every field overridden
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = LineageConfigFileV1 {
            version: Some(CONFIG_VERSION),
            preset: Some(Preset::Balanced.as_str().to_string()),
            overrides: Some(LineageConfigPatch::from(self.clone())),
        };
        Ok(serde_yaml::to_string(&file)?)
    }
}

fn check_range<T>(field: &str, value: T, min: T, max: T, hint: &str) -> ConfigResult<()>
where
    T: PartialOrd + ToString + Copy,
{
    if value < min || value > max {
        return Err(ConfigError::range_with_hint(field, value, min, max, hint));
    }
    Ok(())
}

/// YAML schema v1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineageConfigFileV1 {
    #[serde(default)]
    pub version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<LineageConfigPatch>,
}

/// Partial config; `None` keeps the preset value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineageConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etl_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
}

impl From<LineageConfig> for LineageConfigPatch {
    fn from(config: LineageConfig) -> Self {
        Self {
            queue_capacity: Some(config.queue_capacity),
            batch_size: Some(config.batch_size),
            flush_interval_ms: Some(config.flush_interval_ms),
            stop_timeout_ms: Some(config.stop_timeout_ms),
            default_max_depth: Some(config.default_max_depth),
            max_depth_limit: Some(config.max_depth_limit),
            etl_namespace: Some(config.etl_namespace),
            scan_namespace: Some(config.scan_namespace),
            api_namespace: Some(config.api_namespace),
            producer: Some(config.producer),
        }
    }
}
