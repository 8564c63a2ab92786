//! # gRPC Health Check Library
//!
//! Health aggregation for Kubernetes liveness and readiness checks, served
//! through the standard grpc.health.v1 protocol (tonic-health).
//!
//! ## Features
//!
//! - Named dependency checks run in parallel, each with its own timeout
//! - Panicking or hanging checks are contained and count as unhealthy
//! - Overall status (`""` service) is SERVING only when every check passes
//! - Background monitoring stopped through a cancellation token
//!
//! ## Example
//!
//! ```rust,no_run
//! use grpc_health::{health_check_fn, HealthAggregator, HealthConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (aggregator, health_service) = HealthAggregator::new(HealthConfig::default()).await;
//!
//! aggregator
//!     .register("database", health_check_fn(|| async { Ok(()) }))?
//!     .register("search", health_check_fn(|| async { Ok(()) }))?;
//!
//! let token = CancellationToken::new();
//! aggregator.spawn(token.clone());
//!
//! // Add health_service to your gRPC server
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod checks;
mod error;
mod health;

pub use aggregator::{CheckResult, HealthAggregator, HealthConfig};
pub use checks::{health_check_fn, FnHealthCheck, HealthCheck};
pub use error::{HealthCheckError, RegistrationError, Result};
pub use health::HealthStatus;

// Re-export tonic-health types for convenience
pub use tonic_health::pb::health_server::HealthServer;
pub use tonic_health::server::HealthReporter;
