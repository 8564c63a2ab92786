//! Error types for health check operations

use thiserror::Error;

/// Result type for health check operations
pub type Result<T> = std::result::Result<T, HealthCheckError>;

/// Errors that can occur during health checks
#[derive(Debug, Error)]
pub enum HealthCheckError {
    /// Database connection or query failure
    #[error("Database health check failed: {0}")]
    Database(String),

    /// Dependency reachable but not ready
    #[error("Dependency unavailable: {0}")]
    Unavailable(String),

    /// Generic health check failure
    #[error("Health check failed: {0}")]
    Generic(String),
}

impl HealthCheckError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a generic error
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }
}

/// Errors returned when registering a check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("health check name cannot be empty")]
    EmptyName,

    #[error("health check already registered: {0}")]
    AlreadyRegistered(String),
}
