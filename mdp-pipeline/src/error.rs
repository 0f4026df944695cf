//! Error types for mdp-pipeline
//!
//! Per-record errors stop at the normalisation boundary, per-tick errors stop
//! at the tick, fusion errors stop at the fusion pass. Nothing here is fatal to
//! the scheduler loop.

use crate::services::http_fetch_client::FetchError;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transient network failure that survived every retry
    #[error("Network error: {0}")]
    Network(String),

    /// Non-retryable HTTP status (4xx, unexpected codes)
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Payload is not valid JSON
    #[error("Decode error: {0}")]
    Decode(String),

    /// Payload is JSON but not shaped like the source's records
    #[error("Schema shape error: {0}")]
    SchemaShape(#[from] SchemaShapeError),

    /// Fusion attempted with no usable sea-state observations
    #[error("Empty reference set: no sea-state observations with coordinates")]
    EmptyReferenceSet,

    /// Durable table could not be read back
    #[error("Storage corruption in {path}: {reason}")]
    StorageCorruption { path: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tabular output error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialisation error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Downstream sink failure
    #[error("Sink error: {0}")]
    Sink(String),

    /// Background task failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// mdp-common error
    #[error("Common error: {0}")]
    Common(#[from] mdp_common::Error),
}

impl PipelineError {
    /// Stable identifier used as the `error_kind` log field
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Network(_) => "network",
            PipelineError::Status { .. } => "status",
            PipelineError::Decode(_) => "decode",
            PipelineError::SchemaShape(_) => "schema_shape",
            PipelineError::EmptyReferenceSet => "empty_reference_set",
            PipelineError::StorageCorruption { .. } => "storage_corruption",
            PipelineError::Io(_) => "io",
            PipelineError::Csv(_) => "csv",
            PipelineError::Json(_) => "json",
            PipelineError::Sink(_) => "sink",
            PipelineError::Task(_) => "task",
            PipelineError::Common(_) => "common",
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(msg) => PipelineError::Network(msg),
            FetchError::Status { status, url } => PipelineError::Status { status, url },
            FetchError::Decode(msg) => PipelineError::Decode(msg),
        }
    }
}

/// Why a single raw record could not be normalised
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaShapeError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has unexpected shape: {reason}")]
    BadField { field: &'static str, reason: String },
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
