//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Channels that reached `channel-opened` (counter).
pub const CHANNELS_OPENED_TOTAL: &str = "channels_opened_total";
/// Channels that ended with `transport-error` (counter, labels: kind).
pub const CHANNEL_ERRORS_TOTAL: &str = "channel_errors_total";
/// Synchronous turns served (counter, labels: outcome).
pub const SYNC_TURNS_TOTAL: &str = "sync_turns_total";
