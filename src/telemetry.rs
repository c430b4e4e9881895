//! Telemetry logic.
//! Support tracing, metrics and logging.
use std::net::SocketAddr;

use metrics::Unit;
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::global;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::Telemetry;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const SERVICE_NAME: &str = "tessera";
const DEFAULT_FILTER: &str = "info,sqlx=warn,lapin=warn";

fn resources() -> Resource {
    Resource::builder().with_service_name(SERVICE_NAME).build()
}

/// Create tracer for OLTP.
pub fn setup_tracer(endpoint: &str) -> Result<SdkTracerProvider, BoxError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resources())
        .build())
}

/// Create OLTP exporter for logs.
pub fn setup_logging(
    endpoint: &str,
) -> Result<
    (
        SdkLoggerProvider,
        OpenTelemetryTracingBridge<SdkLoggerProvider, SdkLogger>,
    ),
    BoxError,
> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider = SdkLoggerProvider::builder()
        .with_resource(resources())
        .with_batch_exporter(exporter)
        .build();
    let bridge = OpenTelemetryTracingBridge::new(&provider);
    Ok((provider, bridge))
}

/// Install the Prometheus recorder and its scrape listener.
pub fn setup_metrics(addr: SocketAddr) -> Result<(), BoxError> {
    metrics::describe_counter!(
        "permission_checks_total",
        Unit::Count,
        "Permission gates evaluated, by gate and outcome."
    );
    metrics::describe_counter!(
        "lifecycle_transitions_total",
        Unit::Count,
        "Committed lifecycle transitions, by event kind."
    );
    metrics::describe_counter!(
        "events_publish_failures_total",
        Unit::Count,
        "Events lost after a committed transition, by kind."
    );
    metrics::describe_counter!(
        "events_dispatched_total",
        Unit::Count,
        "Events delivered to reaction handlers, by kind."
    );

    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "prometheus listener started");
    Ok(())
}

/// Providers to flush before exit.
#[derive(Default)]
pub struct TelemetryGuard {
    tracer: Option<SdkTracerProvider>,
    logger: Option<SdkLoggerProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let Some(tracer) = self.tracer {
            if let Err(err) = tracer.shutdown() {
                tracing::warn!(error = %err, "tracer shutdown failed");
            }
        }
        if let Some(logger) = self.logger {
            if let Err(err) = logger.shutdown() {
                tracing::warn!(error = %err, "logger shutdown failed");
            }
        }
    }
}

/// Set up logging, and tracing plus metrics when configured.
///
/// `RUST_LOG` overrides the default filter.
pub fn init(config: &Telemetry) -> Result<TelemetryGuard, BoxError> {
    let mut guard = TelemetryGuard::default();

    let bridge = match &config.otlp_endpoint {
        Some(endpoint) => {
            let tracer = setup_tracer(endpoint)?;
            global::set_tracer_provider(tracer.clone());
            guard.tracer = Some(tracer);

            let (logger, bridge) = setup_logging(endpoint)?;
            guard.logger = Some(logger);
            Some(bridge)
        },
        None => None,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(bridge)
        .try_init()?;

    if let Some(addr) = &config.prometheus {
        setup_metrics(addr.parse()?)?;
    }

    Ok(guard)
}
