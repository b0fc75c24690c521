use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::trace;

/// Interval between two upkeep runs of the Prometheus recorder.
const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

// The recorder can be installed once per process, but tests spawn many servers.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder once and returns a handle to it.
///
/// The first call also spawns a task on the current Tokio runtime that runs
/// upkeep on the recorder so histogram buckets do not grow without bound.
/// Later calls return clones of the same handle and spawn nothing.
///
/// The upkeep task lives on the first caller's runtime and stops when that
/// runtime shuts down. The service builds its handle once on the runtime that
/// serves requests, so this only matters for tests, where each test runs its
/// own runtime: after the first test finishes, later tests keep using the
/// handle without upkeep.
pub fn init_metrics_handle() -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    let upkeep_handle = handle.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(UPKEEP_INTERVAL).await;
            trace!("running metrics upkeep");
            upkeep_handle.run_upkeep();
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn handle_outlives_the_runtime_that_installed_it() {
        let first = runtime();
        let handle = first.block_on(async { init_metrics_handle() }).unwrap();
        drop(first);

        let second = runtime();
        let again = second.block_on(async { init_metrics_handle() }).unwrap();

        assert_eq!(handle.render(), again.render());
    }
}
