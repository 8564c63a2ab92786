//! Request-scoped values for gRPC handlers
//!
//! Interceptors store a [`RequestId`] and the authenticated [`Claims`] in the
//! request extensions. Handlers read them back through [`RequestContextExt`],
//! which is implemented for `http::Extensions`, `http::Request<B>` and
//! `tonic::Request<T>`, so the same calls work at every layer of the stack.
//!
//! ## Usage
//!
//! ```rust
//! use request_context::{Claims, RequestContextExt, RequestId};
//! use tonic::Request;
//!
//! let mut request = Request::new(());
//! request.set_request_id(RequestId::from("req-42"));
//! request.set_claims(Claims {
//!     user_id: "user-1".to_string(),
//!     roles: vec!["admin".to_string()],
//!     ..Default::default()
//! });
//!
//! assert_eq!(request.request_id(), Some("req-42"));
//! assert_eq!(request.user_id(), Some("user-1"));
//! assert!(request.require_claims().unwrap().has_role("admin"));
//! ```

mod claims;
mod ext;
mod request_id;

pub use claims::Claims;
pub use ext::RequestContextExt;
pub use request_id::RequestId;
