//! Metrics initialization for Prometheus exporter.

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::Result;

/// ARP frames sent, labelled with `kind` = `spoof` | `restore`.
pub const ARP_FRAMES_TOTAL: &str = "diamond_arp_frames_total";
/// Completed spoofing rounds.
pub const SPOOF_ROUNDS_TOTAL: &str = "diamond_spoof_rounds_total";
/// Completed restoration rounds.
pub const RESTORE_ROUNDS_TOTAL: &str = "diamond_restore_rounds_total";
/// Hosts answering a discovery probe.
pub const HOSTS_DISCOVERED_TOTAL: &str = "diamond_hosts_discovered_total";

/// Initialize the metrics system based on configuration.
///
/// When metrics are enabled, this starts an HTTP server that exposes
/// a `/metrics` endpoint for Prometheus to scrape.
///
/// When metrics are disabled, this is a no-op. The `metrics` crate
/// handles unregistered metrics gracefully (they become no-ops).
pub fn init(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()
        .map_err(|err| crate::error::Error::Metrics(err.to_string()))?;

    Ok(())
}
