//! Helpers for manual spans around fallible operations

use std::fmt::Display;
use std::future::Future;
use tracing::{field, Instrument, Span};

/// Run `future` inside a new span named `name`
///
/// The span is a child of the current span. When the future resolves to an
/// error, the error is recorded on the span and its status is set to `ERROR`.
///
/// ```rust
/// # async fn example() -> Result<u32, std::io::Error> {
/// let n = telemetry::with_span("load_user", async { Ok::<_, std::io::Error>(42) }).await?;
/// # Ok(n)
/// # }
/// ```
pub async fn with_span<F, T, E>(name: &str, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let span = tracing::info_span!(
        "operation",
        otel.name = name,
        otel.status_code = field::Empty,
        otel.status_message = field::Empty,
        error = field::Empty,
    );

    let result = future.instrument(span.clone()).await;
    if let Err(e) = &result {
        record_error(&span, e);
    }
    result
}

/// Mark `span` as failed with `error`
pub fn record_error<E: Display + ?Sized>(span: &Span, error: &E) {
    let message = error.to_string();
    span.record("error", message.as_str());
    span.record("otel.status_code", "ERROR");
    span.record("otel.status_message", message.as_str());
}
