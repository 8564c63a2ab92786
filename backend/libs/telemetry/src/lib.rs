//! Telemetry setup for services
//!
//! - [`logging`]: level/format parsing and a stderr `tracing` subscriber
//! - [`otel`]: OTLP tracing, metrics and logs wired into `tracing` and the shutdown registry
//! - [`span`]: spans around fallible async operations
//! - [`propagation`]: W3C trace context over HTTP headers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shutdown::Shutdown;
//! use telemetry::{OtelConfig, TelemetryConfig};
//!
//! # async fn example() -> Result<(), telemetry::TelemetryError> {
//! let shutdown = Shutdown::new();
//! let config = TelemetryConfig {
//!     otel: OtelConfig {
//!         enabled: true,
//!         service_name: "orders".to_string(),
//!         service_version: env!("CARGO_PKG_VERSION").to_string(),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//!
//! telemetry::init(&config, &shutdown)?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod logging;
pub mod otel;
pub mod propagation;
pub mod span;

pub use error::TelemetryError;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use otel::{init, OtelConfig, TelemetryConfig};
pub use span::{record_error, with_span};
