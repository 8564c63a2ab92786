//! Mapping of handler errors onto gRPC status codes

use crate::status::{response_status, status_response};
use futures::future::BoxFuture;
use http::{Request, Response};
use std::error::Error as StdError;
use std::fmt;
use std::task::{Context, Poll};
use tonic::{Code, Status};
use tower::{BoxError, Layer, Service};
use tracing::{debug, error};

const INTERNAL_MESSAGE: &str = "internal error";

/// Domain errors that know their gRPC code
///
/// ```rust
/// use grpc_interceptors::{CodedError, RpcCode};
/// use tonic::{Code, Status};
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("order {0} not found")]
/// struct OrderNotFound(u64);
///
/// impl RpcCode for OrderNotFound {
///     fn rpc_code(&self) -> Code {
///         Code::NotFound
///     }
/// }
///
/// let status: Status = CodedError::new(OrderNotFound(7)).into();
/// assert_eq!(status.code(), Code::NotFound);
/// assert_eq!(status.message(), "order 7 not found");
/// ```
pub trait RpcCode {
    fn rpc_code(&self) -> Code;
}

/// An error paired with the code it maps to
#[derive(Debug)]
pub struct CodedError {
    code: Code,
    source: BoxError,
}

impl CodedError {
    pub fn new<E>(err: E) -> Self
    where
        E: RpcCode + StdError + Send + Sync + 'static,
    {
        Self {
            code: err.rpc_code(),
            source: Box::new(err),
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl StdError for CodedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<CodedError> for Status {
    fn from(err: CodedError) -> Self {
        Status::new(err.code, err.to_string())
    }
}

/// Map an arbitrary error to a [`Status`]
///
/// Checked along the source chain, in order: cancelled tasks map to
/// `CANCELLED`, elapsed timeouts to `DEADLINE_EXCEEDED`, a [`CodedError`]
/// to its code, and a [`Status`] is kept as is. Everything else becomes
/// `INTERNAL` with a generic message.
pub fn map_error(err: &(dyn StdError + 'static)) -> Status {
    let chain = || std::iter::successors(Some(err), |e| (*e).source());

    if chain().any(is_cancelled) {
        return Status::cancelled(err.to_string());
    }
    if chain().any(is_elapsed) {
        return Status::deadline_exceeded(err.to_string());
    }
    if let Some(coded) = chain().find_map(|e| e.downcast_ref::<CodedError>()) {
        return Status::new(coded.code(), coded.to_string());
    }
    if let Some(status) = chain().find_map(|e| e.downcast_ref::<Status>()) {
        return status.clone();
    }

    error!(error = %err, "Unmapped error");
    Status::internal(INTERNAL_MESSAGE)
}

fn is_cancelled(err: &(dyn StdError + 'static)) -> bool {
    err.downcast_ref::<tokio::task::JoinError>()
        .is_some_and(|e| e.is_cancelled())
}

fn is_elapsed(err: &(dyn StdError + 'static)) -> bool {
    err.is::<tokio::time::error::Elapsed>()
}

/// Converts service errors into status responses and hides `UNKNOWN`
///
/// Errors returned by the wrapped service go through [`map_error`].
/// Responses carrying `UNKNOWN`, which tonic uses for errors it could not
/// classify, are replaced with `INTERNAL` "internal error".
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMappingLayer;

impl ErrorMappingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ErrorMappingLayer {
    type Service = ErrorMappingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorMappingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorMappingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ErrorMappingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let future = self.inner.call(req);

        Box::pin(async move {
            match future.await {
                Ok(response) => match response_status(&response) {
                    Some(status) if status.code() == Code::Unknown => {
                        debug!(message = %status.message(), "Sanitizing unknown status");
                        Ok(status_response(Status::internal(INTERNAL_MESSAGE)))
                    }
                    _ => Ok(response),
                },
                Err(e) => {
                    let e: BoxError = e.into();
                    Ok(status_response(map_error(e.as_ref())))
                }
            }
        })
    }
}
