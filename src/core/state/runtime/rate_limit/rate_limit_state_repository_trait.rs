use anyhow::Result;
use async_trait::async_trait;

use crate::core::state::runtime::rate_limit::rate_limit_state::RateLimitState;

/// Storage for limiter counters.
///
/// The in-memory implementation never fails; the `Result` lets a shared
/// store report that it is unreachable so the caller can apply its
/// fail-open / fail-closed policy.
#[async_trait]
pub trait RateLimitStateRepositoryTrait: Send + Sync {
    /// Read the state through a closure.
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&RateLimitState) -> T + Send,
        T: Send;

    /// Mutate the state in one critical section and return the closure's value.
    async fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut RateLimitState) -> T + Send,
        T: Send;
}
