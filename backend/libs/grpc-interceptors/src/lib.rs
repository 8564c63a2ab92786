//! Server middleware for gRPC services
//!
//! Tower layers over `http::Request`/`http::Response`, so they plug into
//! `tonic::transport::Server::layer`:
//!
//! - [`RecoveryLayer`]: panics become `INTERNAL`
//! - [`DeadlineLayer`]: default, capped and enforced `grpc-timeout`
//! - [`RequestIdLayer`]: request ID propagation
//! - [`TraceLayer`]: server span linked to the remote trace context
//! - [`LoggingLayer`]: one log line per call
//! - [`AuthLayer`]: bearer token authentication
//! - [`ErrorMappingLayer`]: status code mapping and sanitizing
//!
//! [`InterceptorChain`] composes them in the recommended order.

mod auth;
mod chain;
mod deadline;
mod error;
mod errors;
mod logging;
mod recovery;
mod request_id;
pub mod status;
mod trace;
mod validation;

pub use auth::{bearer_token, AuthLayer, AuthService};
pub use chain::{build_default, build_default_with_auth, DefaultLayer, InterceptorChain};
pub use deadline::{
    format_grpc_timeout, parse_grpc_timeout, Deadline, DeadlineConfig, DeadlineLayer,
    DeadlineService, GRPC_TIMEOUT_HEADER,
};
pub use error::ChainError;
pub use errors::{map_error, CodedError, ErrorMappingLayer, ErrorMappingService, RpcCode};
pub use logging::{LoggingLayer, LoggingService};
pub use recovery::{RecoveryLayer, RecoveryService};
pub use request_id::{RequestIdConfig, RequestIdLayer, RequestIdService};
pub use trace::{split_procedure, TraceLayer, TraceService};
pub use validation::validate;
