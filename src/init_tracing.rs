use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{propagation::TraceContextPropagator, Resource};
use tracing::subscriber::set_global_default;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{
    filter::Targets, fmt::format::FmtSpan, layer::SubscriberExt, Layer, Registry,
};

use crate::config::{LogFormat, Tracing};

pub(super) fn init_tracing(tracing: &Tracing) -> color_eyre::Result<()> {
    LogTracer::init()?;

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let targets: Targets = tracing.logging.targets.parse()?;

    let format_layer =
        tracing_subscriber::fmt::layer().with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    match tracing.logging.format {
        LogFormat::Compact => {
            with_subscriber(tracing, format_layer.compact().with_filter(targets))
        }
        LogFormat::Json => with_subscriber(tracing, format_layer.json().with_filter(targets)),
        LogFormat::Normal => with_subscriber(tracing, format_layer.with_filter(targets)),
        LogFormat::Pretty => with_subscriber(tracing, format_layer.pretty().with_filter(targets)),
    }
}

fn with_subscriber<F>(tracing: &Tracing, format_layer: F) -> color_eyre::Result<()>
where
    F: Layer<Registry> + Send + Sync,
{
    let subscriber = Registry::default()
        .with(format_layer)
        .with(ErrorLayer::default());

    if let Some(url) = tracing.opentelemetry.url.as_ref() {
        let targets: Targets = tracing.opentelemetry.targets.parse()?;

        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(Resource::new(
                vec![KeyValue::new(
                    "service.name",
                    tracing.opentelemetry.service_name.clone(),
                )],
            )))
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(url.as_str()),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        let otel_layer = tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(targets);

        set_global_default(subscriber.with(otel_layer))?;
    } else {
        set_global_default(subscriber)?;
    }

    Ok(())
}
