//! Prometheus exporter setup.

use std::net::SocketAddr;

use {
    anyhow::Result,
    metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    tracing::info,
};

use crate::{buckets, delivery, llm};

/// Install the global recorder and serve `/metrics` on `listen`.
///
/// Must be called from inside a tokio runtime, at most once per process.
pub fn init_prometheus(listen: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .set_buckets_for_metric(
            Matcher::Full(delivery::PACING_DELAY_SECONDS.to_string()),
            &buckets::PACING_DELAY,
        )?
        .set_buckets_for_metric(
            Matcher::Full(llm::COMPLETION_DURATION_SECONDS.to_string()),
            &buckets::LLM_DURATION,
        )?
        .install()?;
    info!(%listen, "prometheus exporter listening");
    Ok(())
}
