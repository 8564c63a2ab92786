//! Server spans for incoming calls

use crate::status::response_code;
use futures::future::BoxFuture;
use http::{Request, Response};
use request_context::RequestContextExt;
use std::task::{Context, Poll};
use tonic::Code;
use tower::{Layer, Service};
use tracing::{field, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Runs each call in a `grpc_request` span parented to the remote context
///
/// The span carries `rpc.service`, `rpc.method`, `request_id`, `user_id`
/// and `rpc.grpc.status_code`. Layers further in record `user_id` once the
/// caller is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceLayer;

impl TraceLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct TraceService<S> {
    inner: S,
}

/// Split `/package.Service/Method` into service and method
pub fn split_procedure(path: &str) -> (&str, &str) {
    let trimmed = path.trim_start_matches('/');
    match trimmed.rsplit_once('/') {
        Some((service, method)) => (service, method),
        None => (trimmed, "unknown"),
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TraceService<S>
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
        let parent = telemetry::propagation::extract_context(req.headers());
        let (service, method) = split_procedure(req.uri().path());

        let span = tracing::info_span!(
            "grpc_request",
            otel.name = %req.uri().path().trim_start_matches('/'),
            otel.kind = "server",
            otel.status_code = field::Empty,
            otel.status_message = field::Empty,
            rpc.system = "grpc",
            rpc.service = %service,
            rpc.method = %method,
            rpc.grpc.status_code = field::Empty,
            request_id = field::Empty,
            user_id = field::Empty,
            error = field::Empty,
        );
        span.set_parent(parent);

        if let Some(id) = req.request_id() {
            span.record("request_id", id);
        }
        if let Some(user_id) = req.user_id() {
            span.record("user_id", user_id);
        }

        let future = {
            let _enter = span.enter();
            self.inner.call(req)
        };

        Box::pin(
            async move {
                let result = future.await;
                let span = Span::current();
                match &result {
                    Ok(response) => {
                        let code = response_code(response);
                        span.record("rpc.grpc.status_code", code as i32);
                        if code != Code::Ok {
                            span.record("otel.status_code", "ERROR");
                        }
                    }
                    Err(e) => telemetry::record_error(&span, e),
                }
                result
            }
            .instrument(span),
        )
    }
}
