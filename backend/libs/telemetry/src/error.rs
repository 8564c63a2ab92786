use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level: {0:?}")]
    InvalidLevel(String),

    #[error("invalid log format: {0:?}")]
    InvalidFormat(String),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("service_name is required")]
    MissingServiceName,

    #[error("service_version is required")]
    MissingServiceVersion,

    #[error("sample_rate must be between 0.0 and 1.0, got {0}")]
    InvalidSampleRate(f64),

    #[error("failed to install tracer: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    #[error("failed to install meter provider: {0}")]
    Metrics(#[from] opentelemetry::metrics::MetricsError),

    #[error("failed to install logger provider: {0}")]
    Logs(#[from] opentelemetry::logs::LogError),
}
