//! Structured logging setup on top of `tracing-subscriber`

use crate::TelemetryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt as subscriber_fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Minimum level of emitted events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(TelemetryError::InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(TelemetryError::InvalidFormat(s.to_string())),
        }
    }
}

/// Logging configuration
///
/// Both fields are matched case-insensitively. `RUST_LOG`, when set, takes
/// precedence over `level` so individual targets can be tuned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// One of "debug", "info", "warn", "warning", "error"
    pub level: String,

    /// One of "text", "json"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LogConfig {
    pub fn level(&self) -> Result<LogLevel, TelemetryError> {
        self.level.parse()
    }

    pub fn format(&self) -> Result<LogFormat, TelemetryError> {
        self.format.parse()
    }
}

/// Install a global subscriber writing to stderr
///
/// Fails on an invalid level or format, or if a global subscriber is
/// already installed.
pub fn init(config: &LogConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config.level()?);
    let format = config.format()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(format))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(level = %config.level, format = %config.format, "Logging initialized");
    Ok(())
}

pub(crate) fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

pub(crate) fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Text => subscriber_fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .boxed(),
        LogFormat::Json => subscriber_fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels_case_insensitive() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("Warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("ERROR".parse::<LogLevel>().unwrap(), LogLevel::Error);
    }

    #[test]
    fn test_invalid_level() {
        for input in ["", "trace", "fatal", "verbose"] {
            let err = input.parse::<LogLevel>().unwrap_err();
            assert!(matches!(err, TelemetryError::InvalidLevel(ref s) if s == input));
        }
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!(matches!(
            "yaml".parse::<LogFormat>(),
            Err(TelemetryError::InvalidFormat(_))
        ));
        assert!(matches!(
            "".parse::<LogFormat>(),
            Err(TelemetryError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level().unwrap(), LogLevel::Info);
        assert_eq!(config.format().unwrap(), LogFormat::Text);
    }

    #[test]
    fn test_init_rejects_bad_config_before_installing() {
        let config = LogConfig {
            level: "loud".to_string(),
            format: "text".to_string(),
        };
        assert!(matches!(init(&config), Err(TelemetryError::InvalidLevel(_))));

        let config = LogConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };
        assert!(matches!(init(&config), Err(TelemetryError::InvalidFormat(_))));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LogConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "json");
    }
}
