//! Panic recovery

use crate::status::status_response;
use futures::future::{BoxFuture, FutureExt};
use http::{Request, Response};
use request_context::RequestContextExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};
use tonic::Status;
use tower::{Layer, Service};
use tracing::error;

/// Turns panics in the wrapped service into `INTERNAL` responses
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl RecoveryLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RecoveryService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let procedure = req.uri().path().to_string();
        let request_id = request_id(&req);

        // Panics while building the future surface here
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(future) => future,
            Err(panic) => {
                let response = recovered(&procedure, request_id.as_deref(), panic);
                return Box::pin(async move { Ok(response) });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Ok(recovered(&procedure, request_id.as_deref(), panic)),
            }
        })
    }
}

fn request_id<B>(req: &Request<B>) -> Option<String> {
    req.request_id().map(str::to_string).or_else(|| {
        req.headers()
            .get(crate::request_id::DEFAULT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

fn recovered<B: Default>(
    procedure: &str,
    request_id: Option<&str>,
    panic: Box<dyn Any + Send>,
) -> Response<B> {
    let backtrace = Backtrace::force_capture();
    error!(
        procedure = %procedure,
        panic = %panic_message(panic.as_ref()),
        request_id = request_id.unwrap_or_default(),
        backtrace = %backtrace,
        "panic recovered"
    );
    status_response(Status::internal("internal error"))
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::response_status;
    use std::convert::Infallible;
    use tonic::Code;
    use tower::{service_fn, ServiceExt};

    fn request() -> Request<String> {
        Request::builder()
            .uri("/orders.v1.OrderService/GetOrder")
            .body(String::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_passes_through() {
        let svc = RecoveryLayer::new().layer(service_fn(|_req: Request<String>| async {
            Ok::<_, Infallible>(Response::new("ok".to_string()))
        }));

        let response = svc.oneshot(request()).await.unwrap();
        assert_eq!(response.body(), "ok");
        assert!(response_status(&response).is_none());
    }

    #[tokio::test]
    async fn test_panic_in_future_becomes_internal() {
        let svc = RecoveryLayer::new().layer(service_fn(|_req: Request<String>| async {
            if true {
                panic!("handler exploded");
            }
            Ok::<_, Infallible>(Response::new(String::new()))
        }));

        let response = svc.oneshot(request()).await.unwrap();
        let status = response_status(&response).unwrap();
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal error");
    }

    #[tokio::test]
    async fn test_panic_in_call_becomes_internal() {
        let svc = RecoveryLayer::new().layer(service_fn(
            |_req: Request<String>| -> std::future::Ready<Result<Response<String>, Infallible>> {
                panic!("sync panic")
            },
        ));

        let response = svc.oneshot(request()).await.unwrap();
        assert_eq!(response_status(&response).unwrap().code(), Code::Internal);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
