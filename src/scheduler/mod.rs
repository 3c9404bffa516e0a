use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::app_state::AppState;

pub mod tasks;

/// Spawn the background loop that runs minutely maintenance.
pub fn start_scheduler(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // first tick fires immediately; nothing to sweep yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            debug!("Scheduler tick");
            if let Err(e) = tasks::minute::run(state.clone()).await {
                error!(?e, "Minutely task failed");
            }
        }
    })
}
