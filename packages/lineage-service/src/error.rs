use lineage_storage::{ErrorKind, StorageError};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, LineageError>;

#[derive(Error, Debug)]
pub enum LineageError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No tokio runtime available to spawn the batch worker")]
    NoRuntime,

    #[error("Batch worker failed: {0}")]
    WorkerJoin(String),

    #[error("Worker did not stop within {0:?}")]
    StopTimeout(std::time::Duration),

    #[cfg(feature = "metrics")]
    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl LineageError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LineageError::Storage(e) if e.is_unavailable() => ErrorCategory::Transient,
            LineageError::Storage(e) if e.kind == ErrorKind::Transaction => {
                ErrorCategory::Transient
            }
            LineageError::Storage(_) => ErrorCategory::Permanent,
            LineageError::Config(_) => ErrorCategory::Permanent,
            LineageError::NoRuntime
            | LineageError::WorkerJoin(_)
            | LineageError::StopTimeout(_) => ErrorCategory::Infrastructure,
            #[cfg(feature = "metrics")]
            LineageError::Metrics(_) => ErrorCategory::Infrastructure,
        }
    }
}

/// Error category, used by dead-letter sinks to decide whether replay makes sense
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Transient error - replay may succeed (e.g., store offline, lock contention)
    Transient,
    /// Permanent error - replay will fail again (e.g., bad payload)
    Permanent,
    /// Infrastructure error - alert ops (e.g., no runtime, worker panic)
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
