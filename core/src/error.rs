use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid argument to {operation}: {reason}")]
    InvalidArgument { operation: &'static str, reason: String },

    #[error("index not built: {0}")]
    IndexNotBuilt(String),

    #[error("{operation} requires a non-empty index")]
    EmptyIndex { operation: &'static str },

    #[error("cannot embed empty input")]
    EmptyInput,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{capability} did not answer within {timeout_ms}ms")]
    CapabilityTimeout { capability: &'static str, timeout_ms: u64 },

    #[error("{capability} failed: {reason}")]
    CapabilityFailed { capability: &'static str, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    pub(crate) fn invalid(operation: &'static str, reason: impl Into<String>) -> Self {
        SearchError::InvalidArgument { operation, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
