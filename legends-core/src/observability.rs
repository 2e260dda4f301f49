//! Logging and OpenTelemetry bootstrap
//!
//! All crates in the workspace log through `tracing`. Binaries (the mock
//! server, demos, game tooling) call [`init_observability`] once at startup
//! to install a subscriber and, optionally, OTLP exporters for traces and
//! metrics.
//!
//! ```rust,no_run
//! use legends_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("match-client")
//!         .with_traces(false)
//!         .with_metrics(false)
//!         .with_log_level("debug");
//!
//!     legends_core::init_observability(config).expect("Failed to init observability");
//!     tracing::info!("ready");
//!     legends_core::shutdown_observability();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint
//! - `RUST_LOG`: Log level filter (takes precedence over the configured level)

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider, Tracer};
use opentelemetry_sdk::Resource;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// How console log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line human readable output
    Pretty,
}

/// Observability configuration
///
/// # Defaults
///
/// - Service name: "city-legends"
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or "http://localhost:4317"
/// - Traces and metrics exported
/// - Log level: `$RUST_LOG` or "info", JSON output
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    /// Service version, defaults to the crate version
    pub service_version: String,
    /// gRPC endpoint of the OpenTelemetry collector
    pub otlp_endpoint: String,
    /// Export spans over OTLP
    pub enable_traces: bool,
    /// Export metrics over OTLP
    pub enable_metrics: bool,
    /// Log level filter, e.g. "info" or "legends_client=debug"
    pub log_level: String,
    /// Console output format
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "city-legends".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: LogFormat::Json,
        }
    }
}

impl ObservabilityConfig {
    /// Create a new configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Console logging only: no OTLP exporters, pretty output
    pub fn console(service_name: impl Into<String>) -> Self {
        Self::new(service_name)
            .with_traces(false)
            .with_metrics(false)
            .with_log_format(LogFormat::Pretty)
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metric export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Set the console output format
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Providers kept so they can be flushed at shutdown
struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

static PROVIDERS: Mutex<Providers> = Mutex::new(Providers {
    tracer: None,
    meter: None,
});

type InitResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Install the global subscriber and any enabled OTLP pipelines
///
/// Call once per process. A second call fails because the global
/// subscriber is already set.
///
/// # Errors
///
/// - The log level directive cannot be parsed
/// - An OTLP exporter cannot be built
/// - A global subscriber is already installed
pub fn init_observability(config: ObservabilityConfig) -> InitResult<()> {
    let tracer_provider = config
        .enable_traces
        .then(|| build_tracer_provider(&config))
        .transpose()?;
    let meter_provider = config
        .enable_metrics
        .then(|| build_meter_provider(&config))
        .transpose()?;

    let tracer = tracer_provider
        .as_ref()
        .map(|provider| provider.tracer(config.service_name.clone()));
    install_subscriber(&config, tracer)?;

    if let Some(provider) = &tracer_provider {
        global::set_tracer_provider(provider.clone());
    }
    if let Some(provider) = &meter_provider {
        global::set_meter_provider(provider.clone());
    }
    if let Ok(mut providers) = PROVIDERS.lock() {
        providers.tracer = tracer_provider;
        providers.meter = meter_provider;
    }

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Observability initialized"
    );
    Ok(())
}

fn build_tracer_provider(config: &ObservabilityConfig) -> InitResult<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .build())
}

fn build_meter_provider(config: &ObservabilityConfig) -> InitResult<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build())
}

fn install_subscriber(config: &ObservabilityConfig, tracer: Option<Tracer>) -> InitResult<()> {
    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    // Client log lines carry the `realtime_client` span (label and endpoint)
    let console = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .with(filter)
        .with(console)
        .try_init()?;
    Ok(())
}

/// Flush pending spans and metrics and stop the exporters
///
/// Safe to call when nothing was initialized, and more than once.
pub fn shutdown_observability() {
    let (tracer, meter) = match PROVIDERS.lock() {
        Ok(mut providers) => (providers.tracer.take(), providers.meter.take()),
        Err(_) => return,
    };

    if let Some(provider) = tracer {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(provider) = meter {
        if let Err(e) = provider.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}
