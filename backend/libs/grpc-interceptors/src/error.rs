use thiserror::Error;

/// Invalid interceptor configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("invalid deadline config: {0}")]
    InvalidDeadline(String),

    #[error("invalid request id header name: {0}")]
    InvalidHeaderName(String),
}
