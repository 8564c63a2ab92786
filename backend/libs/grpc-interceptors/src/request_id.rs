//! Request ID propagation

use crate::ChainError;
use futures::future::{BoxFuture, FutureExt};
use http::{HeaderName, HeaderValue, Request, Response};
use request_context::{RequestContextExt, RequestId};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};
use tower::{Layer, Service};

pub const DEFAULT_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestIdConfig {
    /// Header carrying the request ID; empty selects `x-request-id`
    pub header_name: String,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            header_name: DEFAULT_HEADER.to_string(),
        }
    }
}

/// Reuses the caller's request ID or generates one
///
/// The ID is stored in the request extensions, where [`crate::TraceLayer`]
/// picks it up for the call span, and echoed in the response headers.
#[derive(Debug, Clone)]
pub struct RequestIdLayer {
    header: HeaderName,
}

impl RequestIdLayer {
    pub fn new(config: &RequestIdConfig) -> Result<Self, ChainError> {
        let name = if config.header_name.is_empty() {
            DEFAULT_HEADER
        } else {
            config.header_name.as_str()
        };
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ChainError::InvalidHeaderName(name.to_string()))?;
        Ok(Self { header })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }
}

impl Default for RequestIdLayer {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(DEFAULT_HEADER),
        }
    }
}

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService {
            inner,
            header: self.header.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestIdService<S> {
    inner: S,
    header: HeaderName,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestIdService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let id = req
            .headers()
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(RequestId::from)
            .unwrap_or_else(RequestId::generate);

        req.set_request_id(id.clone());

        let header = self.header.clone();
        self.inner
            .call(req)
            .map(move |result| {
                result.map(|mut response| {
                    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                        response.headers_mut().insert(header, value);
                    }
                    response
                })
            })
            .boxed()
    }
}
