//! Observability: logging, optional OTLP tracing, and Prometheus metrics.

use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, ObservabilityConfig};

/// Initialize the tracing stack.
///
/// `RUST_LOG` takes precedence over the configured log level. When an OTLP
/// endpoint is configured, spans are also exported over gRPC.
pub fn init(service_name: &str, config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    let telemetry_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    opentelemetry_sdk::trace::config().with_resource(
                        opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                            "service.name",
                            service_name.to_string(),
                        )]),
                    ),
                )
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(telemetry_layer)
        .with(filter)
        .try_init()?;

    Ok(())
}

/// Flush and shut down OpenTelemetry.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Metrics recorder and descriptions.
pub mod metrics {
    use ::metrics::describe_counter;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

    /// Install the global Prometheus recorder and describe Warden's metrics.
    ///
    /// Can only succeed once per process.
    pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        register_metrics();
        Ok(handle)
    }

    /// Register all metric descriptions.
    pub fn register_metrics() {
        describe_counter!(
            "warden_permission_cache_hits_total",
            "Permission lookups answered from the cache"
        );
        describe_counter!(
            "warden_permission_cache_misses_total",
            "Permission lookups that read the permission store"
        );
        describe_counter!(
            "warden_permission_cache_invalidations_total",
            "Permission cache entries evicted by a grant or revoke"
        );
        describe_counter!(
            "warden_authz_decisions_total",
            "Authorization decisions by outcome"
        );
        describe_counter!(
            "warden_auth_failures_total",
            "Rejected authentication attempts by reason"
        );
        describe_counter!(
            "warden_errors_total",
            "Errors raised, by code and severity"
        );
    }
}
