use thiserror::Error;

/// Contract violations reported by the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl SearchError {
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        SearchError::InvalidArgument(message.into())
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        SearchError::OutOfRange(message.into())
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
