//! Health check trait and closure adapter

use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;

/// Trait for health check implementations
///
/// Implement this trait to create custom health checks for your dependencies.
/// The aggregator bounds every call with its configured timeout.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Perform the health check
    ///
    /// Returns `Ok(())` if the dependency is healthy, or an error describing the problem.
    async fn check(&self) -> Result<()>;
}

/// Health check backed by an async closure, see [`health_check_fn`]
pub struct FnHealthCheck<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> HealthCheck for FnHealthCheck<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn check(&self) -> Result<()> {
        (self.f)().await
    }
}

/// Adapt an async closure into a [`HealthCheck`]
///
/// ```rust
/// use grpc_health::{health_check_fn, HealthCheckError};
///
/// let check = health_check_fn(|| async {
///     Err::<(), _>(HealthCheckError::unavailable("warming up"))
/// });
/// ```
pub fn health_check_fn<F, Fut>(f: F) -> FnHealthCheck<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnHealthCheck { f }
}
