use thiserror::Error;

/// Errors from pool creation and transaction handling
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("database url is required")]
    DsnRequired,

    #[error("invalid database url: {0}")]
    InvalidDsn(#[source] sqlx::Error),

    #[error("failed to create postgres pool: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("ping postgres: {0}")]
    Ping(#[source] sqlx::Error),

    #[error("database verification timed out after {0}s")]
    VerifyTimeout(u64),

    #[error("begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}
