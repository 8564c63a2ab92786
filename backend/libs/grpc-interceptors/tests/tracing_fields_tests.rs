//! Fields the chain records on spans and events

use grpc_interceptors::{build_default, status::response_status};
use http::{Request, Response};
use std::fmt;
use std::sync::{Arc, Mutex};
use tonic::Code;
use tower::{service_fn, BoxError, Layer as _, ServiceExt};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

type Fields = Arc<Mutex<Vec<(String, String)>>>;

/// Collects every span and event field as `(name, value)`
#[derive(Clone, Default)]
struct CaptureLayer {
    fields: Fields,
}

impl CaptureLayer {
    fn values(&self, name: &str) -> Vec<String> {
        self.fields
            .lock()
            .unwrap()
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
            .collect()
    }
}

struct Collect<'a>(&'a Fields);

impl Visit for Collect<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0
            .lock()
            .unwrap()
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .lock()
            .unwrap()
            .push((field.name().to_string(), format!("{value:?}")));
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        attrs.record(&mut Collect(&self.fields));
    }

    fn on_record(&self, _id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
        values.record(&mut Collect(&self.fields));
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        event.record(&mut Collect(&self.fields));
    }
}

fn capture() -> (CaptureLayer, tracing::subscriber::DefaultGuard) {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (layer, guard)
}

fn request(id: &str) -> Request<String> {
    Request::builder()
        .uri("/orders.v1.OrderService/GetOrder")
        .header("x-request-id", id)
        .body(String::new())
        .unwrap()
}

#[tokio::test(flavor = "current_thread")]
async fn test_request_id_recorded_on_call_span() {
    let (captured, _guard) = capture();

    let svc = build_default().unwrap().layer(service_fn(|_req: Request<String>| async {
        Ok::<_, BoxError>(Response::new(String::new()))
    }));
    svc.oneshot(request("req-span-1")).await.unwrap();

    assert!(captured.values("request_id").contains(&"req-span-1".to_string()));
    assert!(captured.values("rpc.method").contains(&"GetOrder".to_string()));
}

#[tokio::test(flavor = "current_thread")]
async fn test_recovered_panic_logs_backtrace() {
    let (captured, _guard) = capture();

    let svc = build_default().unwrap().layer(service_fn(|_req: Request<String>| async {
        if true {
            panic!("boom");
        }
        Ok::<_, BoxError>(Response::new(String::new()))
    }));
    let response = svc.oneshot(request("req-panic-1")).await.unwrap();
    assert_eq!(response_status(&response).unwrap().code(), Code::Internal);

    assert_eq!(captured.values("panic"), vec!["boom".to_string()]);
    let backtraces = captured.values("backtrace");
    assert_eq!(backtraces.len(), 1);
    assert!(!backtraces[0].is_empty());
}
