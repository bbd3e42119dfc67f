use log::*;
use payment_reconciler::{ReconciliationApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::config::SweepConfig;

/// Starts the pending-confirmation sweep. Returns `None` if the sweep is disabled. Do not await the returned
/// JoinHandle, as it will run indefinitely.
pub fn start_sweep_worker(api: ReconciliationApi<SqliteDatabase>, config: SweepConfig) -> Option<JoinHandle<()>> {
    if !config.is_enabled() {
        info!("🕰️ The pending confirmation sweep is disabled");
        return None;
    }
    let handle = tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.interval);
        info!("🕰️ Pending confirmation sweep started. Running every {}s", config.interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running pending confirmation sweep");
            match api.sweep_pending(config.batch_size).await {
                Ok(result) if result.examined == 0 => trace!("🕰️ No buffered confirmations to sweep"),
                Ok(result) if result.linked > 0 || result.failed > 0 => info!("🕰️ Sweep complete: {result}"),
                Ok(result) => debug!("🕰️ Sweep complete: {result}"),
                Err(e) => error!("🕰️ Error running the pending confirmation sweep: {e}"),
            }
        }
    });
    Some(handle)
}
