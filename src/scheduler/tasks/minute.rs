use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::app_state::AppState;

pub async fn run(state: AppState) -> Result<()> {
    run_at(state, Utc::now()).await.map(|_| ())
}

/// Evict rate-limit records whose windows have fully elapsed.
pub async fn run_at(state: AppState, now: DateTime<Utc>) -> Result<usize> {
    debug!("Running minutely task (rate limit sweep)...");

    let evicted = state.rate_limiter.sweep_at(now).await?;
    if evicted > 0 {
        debug!(evicted, "Evicted expired rate limit records");
    }

    Ok(evicted)
}

/* ---------------- Tests ---------------- */
