//! JWT authentication backed by a JWKS endpoint
//!
//! [`Authenticator`] verifies bearer tokens with keys fetched from an
//! identity provider and maps the payload onto
//! [`request_context::Claims`] through a configurable [`ClaimsMapping`].
//! The gRPC layer that reads the `authorization` header lives in
//! `grpc-interceptors`.

mod authenticator;
mod claims;
mod config;
mod error;
mod jwks;

pub use authenticator::Authenticator;
pub use claims::{extract_claims, resolve_claim, to_string_list};
pub use config::{AuthConfig, ClaimsMapping};
pub use error::AuthError;
pub use jwks::{HttpKeySource, JwksCache, KeySource, MIN_REFRESH_INTERVAL};
