use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::core::state::runtime::rate_limit::rate_limit_state::RateLimitState;
use crate::core::state::runtime::rate_limit::rate_limit_state_repository_trait::RateLimitStateRepositoryTrait;

/// Process-local counter store.
pub struct RateLimitStateRepository {
    state: RwLock<RateLimitState>,
}

impl RateLimitStateRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RateLimitState::default()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for RateLimitStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateLimitStateRepositoryTrait for RateLimitStateRepository {
    async fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&RateLimitState) -> T + Send,
        T: Send,
    {
        let guard = self.state.read().await;
        Ok(f(&guard))
    }

    /// Mutates in place under the write lock; check and record happen
    /// without another request interleaving.
    async fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut RateLimitState) -> T + Send,
        T: Send,
    {
        let mut guard = self.state.write().await;
        Ok(f(&mut guard))
    }
}
