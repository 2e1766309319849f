use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::gauge;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus recorder. With an address, the exporter serves
/// the exposition format itself; without one, counters are still recorded
/// for tests and local runs.
pub fn init(listen_addr: Option<&str>) -> Result<()> {
    let builder = PrometheusBuilder::new();

    match listen_addr {
        Some(addr) => {
            let addr: SocketAddr = addr.parse().context("metrics: invalid METRICS_ADDR")?;
            builder
                .with_http_listener(addr)
                .install()
                .context("metrics: install recorder")?;
        }
        None => {
            let _handle = builder
                .install_recorder()
                .context("metrics: install recorder")?;
        }
    }

    // Static gauge with the engine's reply-timeout budget.
    gauge!("reply_timeout_secs").set(crate::engine::DEFAULT_REPLY_TIMEOUT.as_secs() as f64);
    Ok(())
}
