//! Shared error types for the memory pipeline.
//!
//! Each component gets its own `thiserror` enum so callers can match on the
//! failure kind without string-parsing, following the same shape as the
//! rest of the workspace.

use thiserror::Error;

/// Errors surfaced by the Graph Store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("permission denied: user {user_id} does not own {id}")]
    PermissionDenied { user_id: String, id: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("initialization error: {0}")]
    Init(String),
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the Vector Store.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VectorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid input: all of documents/metadatas/ids/embeddings must have equal length")]
    LengthMismatch,
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("storage busy, retry exhausted")]
    StorageBusy,
}

pub type VectorResult<T> = std::result::Result<T, VectorError>;

/// Errors surfaced by the Perception Layer.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("upstream llm failure: {0}")]
    Upstream(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("request cancelled")]
    Cancelled,
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
}

pub type PerceptionResult<T> = std::result::Result<T, PerceptionError>;

/// Errors surfaced by the Ingestion Orchestrator.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("vector error: {0}")]
    Vector(#[from] VectorError),
    #[error("job cancelled")]
    Cancelled,
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;
