use crate::config::Config;
use axum::extract::MatchedPath;
use axum::http::Request;
use metrics::{describe_counter, Unit};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const DEFAULT_FILTER: &str = "deskline=debug,tower_http=debug,sqlx=warn";

pub const TRANSITIONS_METRIC: &str = "deskline_ticket_transitions_total";
pub const NOTIFICATIONS_METRIC: &str = "deskline_notifications_total";
pub const LIVE_PUSHES_METRIC: &str = "deskline_timeline_live_pushes_total";

/// Flushes pending OTLP spans when dropped.
pub struct ObservabilityGuard;

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        global::shutdown_tracer_provider();
    }
}

/// Install the subscriber and, when `with_metrics` is set, the Prometheus
/// exporter. One-shot maintenance commands skip the exporter.
pub fn init(
    config: &Config,
    with_metrics: bool,
) -> Result<ObservabilityGuard, Box<dyn std::error::Error + Send + Sync>> {
    init_tracing(config)?;
    if with_metrics {
        init_metrics(config)?;
    }
    Ok(ObservabilityGuard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn resource(config: &Config) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}

fn init_tracing(config: &Config) -> InitResult {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_target(true);

    let Some(endpoint) = &config.otel_exporter_endpoint else {
        Registry::default().with(env_filter()).with(fmt_layer).init();
        return Ok(());
    };

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(resource(config)))
        .install_batch(runtime::Tokio)?;

    Registry::default()
        .with(env_filter())
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();
    tracing::info!("Exporting traces of {} to {}", config.service_name, endpoint);
    Ok(())
}

fn init_metrics(config: &Config) -> InitResult {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .add_global_label("service", config.service_name.clone())
        .install()?;

    describe_counter!(
        TRANSITIONS_METRIC,
        Unit::Count,
        "Ticket lifecycle transitions, labelled by action"
    );
    describe_counter!(
        NOTIFICATIONS_METRIC,
        Unit::Count,
        "Outbound notifications, labelled by kind and outcome"
    );
    describe_counter!(
        LIVE_PUSHES_METRIC,
        Unit::Count,
        "Timeline events handed to live viewers"
    );

    tracing::info!("Prometheus metrics for {} on port {}", config.service_name, config.metrics_port);
    Ok(())
}

/// Span for one HTTP request, keyed by the route template so ticket ids do
/// not explode span names.
pub fn request_span<B>(request: &Request<B>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());
    tracing::info_span!(
        "deskline.request",
        method = %request.method(),
        route = %route,
        uri = %request.uri(),
    )
}
