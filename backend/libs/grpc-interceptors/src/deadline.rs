//! Deadline enforcement driven by the `grpc-timeout` header

use crate::status::status_response;
use crate::ChainError;
use futures::future::BoxFuture;
use http::{HeaderValue, Request, Response};
use serde::{Deserialize, Serialize};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tonic::Status;
use tower::{Layer, Service};
use tracing::debug;

pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Largest value the header can carry per unit
const MAX_TIMEOUT_VALUE: u128 = 99_999_999;

const UNITS: [(char, u128); 6] = [
    ('n', 1),
    ('u', 1_000),
    ('m', 1_000_000),
    ('S', 1_000_000_000),
    ('M', 60_000_000_000),
    ('H', 3_600_000_000_000),
];

/// Deadline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Timeout for calls that arrive without `grpc-timeout`; must be positive
    pub default_timeout_secs: u64,
    /// Upper bound for client supplied timeouts; 0 disables the cap
    pub max_timeout_secs: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            max_timeout_secs: 300,
        }
    }
}

impl DeadlineConfig {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.default_timeout_secs == 0 {
            return Err(ChainError::InvalidDeadline(
                "default timeout must be positive".to_string(),
            ));
        }
        if self.max_timeout_secs > 0 && self.max_timeout_secs < self.default_timeout_secs {
            return Err(ChainError::InvalidDeadline(
                "max timeout must be >= default timeout when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// `None` when uncapped
    pub fn max_timeout(&self) -> Option<Duration> {
        (self.max_timeout_secs > 0).then(|| Duration::from_secs(self.max_timeout_secs))
    }
}

/// Effective deadline of the current call, stored in request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Timeout granted when the call started
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Parse a `grpc-timeout` value such as `100m` or `30S`
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let unit = value.chars().last()?;
    let digits = &value[..value.len() - unit.len_utf8()];
    if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        'H' => Some(Duration::from_secs(amount * 3600)),
        'M' => Some(Duration::from_secs(amount * 60)),
        'S' => Some(Duration::from_secs(amount)),
        'm' => Some(Duration::from_millis(amount)),
        'u' => Some(Duration::from_micros(amount)),
        'n' => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

/// Encode `timeout` as a `grpc-timeout` value
///
/// Uses the coarsest unit that is exact, otherwise the finest unit that
/// fits in eight digits, rounding down.
pub fn format_grpc_timeout(timeout: Duration) -> String {
    let nanos = timeout.as_nanos();

    for (unit, per) in UNITS.iter().rev() {
        if nanos % per == 0 && nanos / per <= MAX_TIMEOUT_VALUE {
            return format!("{}{}", nanos / per, unit);
        }
    }
    for (unit, per) in UNITS.iter() {
        if nanos / per <= MAX_TIMEOUT_VALUE {
            return format!("{}{}", nanos / per, unit);
        }
    }
    format!("{MAX_TIMEOUT_VALUE}H")
}

/// Applies a default deadline, caps client deadlines and enforces them
///
/// The effective timeout is written back to `grpc-timeout` and stored as a
/// [`Deadline`] extension. When it elapses the call is dropped and the
/// client receives `DEADLINE_EXCEEDED`.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineLayer {
    default_timeout: Duration,
    max_timeout: Option<Duration>,
}

impl DeadlineLayer {
    pub fn new(config: &DeadlineConfig) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self {
            default_timeout: config.default_timeout(),
            max_timeout: config.max_timeout(),
        })
    }

    fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match (requested, self.max_timeout) {
            (None, _) => self.default_timeout,
            (Some(requested), Some(max)) if requested > max => max,
            (Some(requested), _) => requested,
        }
    }
}

impl Default for DeadlineLayer {
    fn default() -> Self {
        let config = DeadlineConfig::default();
        Self {
            default_timeout: config.default_timeout(),
            max_timeout: config.max_timeout(),
        }
    }
}

impl<S> Layer<S> for DeadlineLayer {
    type Service = DeadlineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DeadlineService {
            inner,
            layer: *self,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeadlineService<S> {
    inner: S,
    layer: DeadlineLayer,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DeadlineService<S>
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

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let requested = req
            .headers()
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout);
        let timeout = self.layer.effective_timeout(requested);

        if let Ok(value) = HeaderValue::from_str(&format_grpc_timeout(timeout)) {
            req.headers_mut().insert(GRPC_TIMEOUT_HEADER, value);
        }
        let deadline = Deadline::after(timeout);
        req.extensions_mut().insert(deadline);

        let procedure = req.uri().path().to_string();
        let future = self.inner.call(req);

        Box::pin(async move {
            match tokio::time::timeout_at(deadline.instant(), future).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(procedure = %procedure, timeout = ?timeout, "Deadline exceeded");
                    Ok(status_response(Status::deadline_exceeded("deadline exceeded")))
                }
            }
        })
    }
}
