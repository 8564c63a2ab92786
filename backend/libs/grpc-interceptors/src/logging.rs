//! Per-call structured logging

use crate::status::{code_name, response_status};
use futures::future::BoxFuture;
use http::{Request, Response};
use request_context::RequestContextExt;
use std::task::{Context, Poll};
use std::time::Instant;
use tonic::Code;
use tower::{Layer, Service};
use tracing::{info, warn};

/// Logs `rpc completed` at info or `rpc failed` at warn once a call finishes
///
/// The user ID is taken from the request, or from the response when an
/// authentication layer further in stored the caller's claims there.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl LoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LoggingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: std::fmt::Display,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let procedure = req.uri().path().to_string();
        let request_id = req.request_id().map(str::to_string);
        let user_id = req.user_id().map(str::to_string);
        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let (code, error) = match &result {
                Ok(response) => match response_status(response) {
                    Some(status) if status.code() != Code::Ok => {
                        (status.code(), Some(status.message().to_string()))
                    }
                    _ => (Code::Ok, None),
                },
                Err(e) => (Code::Unknown, Some(e.to_string())),
            };
            let user_id = user_id.or_else(|| {
                result
                    .as_ref()
                    .ok()
                    .and_then(|r| r.extensions().user_id())
                    .map(str::to_string)
            });

            let request_id = request_id.as_deref().unwrap_or_default();
            let user_id = user_id.as_deref().unwrap_or_default();
            match error {
                None => info!(
                    procedure = %procedure,
                    status = code_name(code),
                    request_id,
                    user_id,
                    elapsed_ms,
                    "rpc completed"
                ),
                Some(error) => warn!(
                    procedure = %procedure,
                    status = code_name(code),
                    request_id,
                    user_id,
                    elapsed_ms,
                    error = %error,
                    "rpc failed"
                ),
            }

            result
        })
    }
}
