//! Process-wide Prometheus recorder
//!
//! The global recorder can only be installed once per process; restarting
//! the server in the same process reuses the first handle.

use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static PROM_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the recorder on first call. `None` when another recorder was
/// already installed by someone else; metrics then go there instead.
pub fn install_prometheus_recorder() -> Option<PrometheusHandle> {
    PROM_HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            match metrics::set_global_recorder(recorder) {
                Ok(()) => {
                    info!("Prometheus metrics recorder installed");
                    Some(handle)
                }
                Err(e) => {
                    warn!(error = %e, "Prometheus recorder not installed");
                    None
                }
            }
        })
        .clone()
}
