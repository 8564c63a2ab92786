//! OpenTelemetry tracing, metrics and log export setup

use crate::logging::{self, LogConfig};
use crate::TelemetryError;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{global, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    logs::LoggerProvider,
    metrics::SdkMeterProvider,
    propagation::{BaggagePropagator, TraceContextPropagator},
    resource::{EnvResourceDetector, SdkProvidedResourceDetector, TelemetryResourceDetector},
    runtime,
    trace::{RandomIdGenerator, Sampler, Tracer},
    Resource,
};
use serde::{Deserialize, Serialize};
use shutdown::Shutdown;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

const RESOURCE_DETECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration for tracing, metrics and log export
///
/// The OTLP exporters additionally honor the standard `OTEL_EXPORTER_OTLP_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtelConfig {
    /// Service name (required when enabled)
    pub service_name: String,

    /// Service version (required when enabled)
    pub service_version: String,

    /// Deployment environment (development, staging, production)
    pub environment: String,

    /// Install the OpenTelemetry pipeline; when false only logging is set up
    pub enabled: bool,

    /// OTLP collector endpoint (gRPC)
    /// Example: "http://otel-collector:4317"
    pub otlp_endpoint: String,

    /// Sample rate (0.0 to 1.0) for root spans; child spans follow their parent
    pub sample_rate: f64,

    /// Also export metrics through OTLP
    pub export_metrics: bool,

    /// Also export log events through OTLP
    pub export_logs: bool,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            service_version: String::new(),
            environment: "development".to_string(),
            enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
            sample_rate: 1.0,
            export_metrics: true,
            export_logs: true,
        }
    }
}

impl OtelConfig {
    pub fn validate(&self) -> Result<(), TelemetryError> {
        if !self.enabled {
            return Ok(());
        }
        if self.service_name.is_empty() {
            return Err(TelemetryError::MissingServiceName);
        }
        if self.service_version.is_empty() {
            return Err(TelemetryError::MissingServiceVersion);
        }
        if !(0.0..=1.0).contains(&self.sample_rate) {
            return Err(TelemetryError::InvalidSampleRate(self.sample_rate));
        }
        Ok(())
    }
}

/// Logging plus OpenTelemetry configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log: LogConfig,
    pub otel: OtelConfig,
}

/// Install logging and, when enabled, OpenTelemetry tracing, metrics and logs
///
/// Must be called from within a Tokio runtime when OpenTelemetry is enabled,
/// since the batch exporters spawn background tasks. Registers a shutdown
/// handler that flushes and stops the providers. When the global subscriber
/// cannot be installed, the providers built so far are shut down again.
pub fn init(config: &TelemetryConfig, shutdown: &Shutdown) -> Result<(), TelemetryError> {
    let level = config.log.level()?;
    let format = config.log.format()?;
    config.otel.validate()?;

    if !config.otel.enabled {
        logging::init(&config.log)?;
        tracing::info!("OpenTelemetry disabled, logging only");
        return Ok(());
    }

    if tracing::dispatcher::has_been_set() {
        return Err(TelemetryError::AlreadyInitialized(
            "a global subscriber is already set".to_string(),
        ));
    }

    let otel = &config.otel;
    let resource = build_resource(otel);
    let mut providers = Providers::default();

    let tracer = init_tracer(otel, resource.clone())?;
    providers.tracing = true;

    if otel.export_metrics {
        match init_meter_provider(otel, resource.clone()) {
            Ok(provider) => providers.meter = Some(provider),
            Err(e) => {
                providers.abandon();
                return Err(e);
            }
        }
    }

    if otel.export_logs {
        match init_logger_provider(otel, resource) {
            Ok(provider) => providers.logger = Some(provider),
            Err(e) => {
                providers.abandon();
                return Err(e);
            }
        }
    }

    let log_bridge = providers.logger.as_ref().map(|provider| {
        OpenTelemetryTracingBridge::new(provider).with_filter(exporter_noise_filter())
    });

    let installed = tracing_subscriber::registry()
        .with(logging::env_filter(level))
        .with(logging::fmt_layer(format))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(log_bridge)
        .try_init();

    if let Err(e) = installed {
        providers.abandon();
        return Err(TelemetryError::AlreadyInitialized(e.to_string()));
    }

    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    shutdown.register("opentelemetry", move || async move {
        // Provider shutdown blocks until the exporters flush
        tokio::task::spawn_blocking(move || providers.shutdown()).await?
    });

    tracing::info!(
        service = %otel.service_name,
        version = %otel.service_version,
        environment = %otel.environment,
        endpoint = %otel.otlp_endpoint,
        sample_rate = otel.sample_rate,
        metrics = otel.export_metrics,
        logs = otel.export_logs,
        "OpenTelemetry initialized"
    );

    Ok(())
}

/// Providers installed by [`init`]
#[derive(Default)]
struct Providers {
    tracing: bool,
    meter: Option<SdkMeterProvider>,
    logger: Option<LoggerProvider>,
}

impl Providers {
    /// Flush and stop everything; blocks until the exporters finish
    fn shutdown(mut self) -> anyhow::Result<()> {
        if self.tracing {
            global::shutdown_tracer_provider();
        }
        if let Some(logger) = self.logger.take() {
            for result in logger.force_flush() {
                result?;
            }
            // The last handle going away stops the batch processor
            global::shutdown_logger_provider();
            drop(logger);
        }
        if let Some(meter) = self.meter.take() {
            meter.shutdown()?;
        }
        Ok(())
    }

    /// Shut down on a separate thread so the runtime driving the batch
    /// exporters keeps running
    fn abandon(self) {
        std::thread::spawn(move || {
            if let Err(e) = self.shutdown() {
                tracing::warn!(error = %e, "Failed to stop OpenTelemetry providers");
            }
        });
    }
}

/// Keeps the exporter's own transport events out of the log export
fn exporter_noise_filter() -> Targets {
    Targets::new()
        .with_default(LevelFilter::TRACE)
        .with_target("opentelemetry", LevelFilter::OFF)
        .with_target("opentelemetry_sdk", LevelFilter::OFF)
        .with_target("opentelemetry_otlp", LevelFilter::OFF)
        .with_target("tonic", LevelFilter::OFF)
        .with_target("h2", LevelFilter::OFF)
        .with_target("hyper", LevelFilter::OFF)
        .with_target("tower", LevelFilter::OFF)
}

fn build_resource(config: &OtelConfig) -> Resource {
    let detected = Resource::from_detectors(
        RESOURCE_DETECT_TIMEOUT,
        vec![
            Box::new(SdkProvidedResourceDetector),
            Box::new(EnvResourceDetector::new()),
            Box::new(TelemetryResourceDetector),
        ],
    );

    detected.merge(&Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]))
}

fn init_tracer(config: &OtelConfig, resource: Resource) -> Result<Tracer, TelemetryError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.otlp_endpoint.clone());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    config.sample_rate,
                ))))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .install_batch(runtime::Tokio)?;

    Ok(tracer)
}

fn init_meter_provider(
    config: &OtelConfig,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.otlp_endpoint.clone());

    let provider = opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(exporter)
        .with_resource(resource)
        .build()?;

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

fn init_logger_provider(
    config: &OtelConfig,
    resource: Resource,
) -> Result<LoggerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.otlp_endpoint.clone());

    let logger = opentelemetry_otlp::new_pipeline()
        .logging()
        .with_log_config(opentelemetry_sdk::logs::config().with_resource(resource))
        .with_exporter(exporter)
        .install_batch(runtime::Tokio)?;

    Ok(logger.provider().clone())
}
