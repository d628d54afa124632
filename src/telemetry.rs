use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use opentelemetry::trace::{TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context as OtelContext, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::{
    BatchConfigBuilder, BatchSpanProcessor, SdkTracer, SdkTracerProvider, SpanExporter,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const SERVICE_NAME: &str = "autograde";
const TRACES_PATH: &str = "/v1/traces";

/// OpenTelemetry tracer exporting analysis phases over OTLP/HTTP.
pub(crate) struct Telemetry {
    tracer: SdkTracer,
    provider: SdkTracerProvider,
}

impl Telemetry {
    /// Connect to an OTLP collector; `endpoint` may be the collector root.
    pub(crate) fn connect(endpoint: &str) -> Result<Self> {
        let endpoint = trace_endpoint(endpoint)?;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("build OTLP span exporter")?;
        Ok(Self::from_exporter(exporter))
    }

    pub(crate) fn in_span<T, F>(&self, name: &str, attributes: &[KeyValue], f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.tracer.in_span(name.to_string(), |cx| {
            let span = cx.span();
            for attribute in attributes {
                span.set_attribute(attribute.clone());
            }
            f()
        })
    }

    /// Flush pending spans.
    pub(crate) fn shutdown(&self) -> Result<()> {
        self.provider
            .shutdown()
            .map_err(|err| anyhow!("failed to shutdown tracer provider: {err}"))
    }

    fn from_exporter<E: SpanExporter + 'static>(exporter: E) -> Self {
        // Check spans end on rayon workers; the processor only queues them there.
        let batch_config = BatchConfigBuilder::default()
            .with_max_queue_size(16_384)
            .with_max_export_batch_size(1024)
            .with_scheduled_delay(Duration::from_millis(200))
            .build();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();
        let provider = SdkTracerProvider::builder()
            .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
            .with_span_processor(processor)
            .build();
        let tracer = provider.tracer(SERVICE_NAME);
        opentelemetry::global::set_tracer_provider(provider.clone());
        Self { tracer, provider }
    }
}

/// Point a collector URL at its trace intake.
fn trace_endpoint(endpoint: &str) -> Result<String> {
    let mut url = reqwest::Url::parse(endpoint)
        .with_context(|| format!("invalid OTLP endpoint {endpoint}"))?;
    let path = url.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        url.set_path(TRACES_PATH);
    } else if let Some(prefix) = path
        .strip_suffix("/v1/logs")
        .or_else(|| path.strip_suffix("/v1/metrics"))
    {
        url.set_path(&format!("{prefix}{TRACES_PATH}"));
    }
    Ok(url.to_string())
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default filter;
/// `quiet` keeps only warnings.
pub(crate) fn init_logging(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "autograde=info,warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // a subscriber installed earlier (tests) wins
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Trace id of the active span, if it is being recorded.
pub(crate) fn current_trace_id() -> Option<String> {
    let cx = OtelContext::current();
    let span_context = cx.span().span_context().clone();
    span_context
        .is_valid()
        .then(|| span_context.trace_id().to_string())
}

/// Run `f` inside a span when telemetry is enabled.
pub(crate) fn with_span<T, F>(
    telemetry: Option<&Telemetry>,
    name: &str,
    attributes: &[KeyValue],
    f: F,
) -> T
where
    F: FnOnce() -> T,
{
    match telemetry {
        Some(telemetry) => telemetry.in_span(name, attributes, f),
        None => f(),
    }
}
