use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::HoldManager;

/// Runs `sweep_expired` every `every` until the handle is aborted.
///
/// Between ticks, lapsed holds are already treated as expired by every read
/// and overlap check; the sweep only makes storage catch up.
pub fn spawn_expiry_sweeper(manager: Arc<HoldManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Expiry sweeper started, running every {:?}", every);

        loop {
            ticker.tick().await;
            match manager.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => info!("Expired {} lapsed holds", count),
                Err(e) => error!("Expiry sweep failed: {}", e),
            }
        }
    })
}
