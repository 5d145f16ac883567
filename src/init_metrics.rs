use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::Metrics;

pub(super) fn init_metrics(metrics: &Metrics) -> color_eyre::Result<()> {
    if let Some(address) = metrics.prometheus_address {
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()?;
    }

    Ok(())
}
