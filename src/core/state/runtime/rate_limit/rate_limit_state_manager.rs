use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::core::state::runtime::rate_limit::rate_limit_policy::{
    LimitedRoute, RateLimitPolicies, RateLimitScope,
};
use crate::core::state::runtime::rate_limit::rate_limit_state::AdmissionDecision;
use crate::core::state::runtime::rate_limit::rate_limit_state_repository_trait::RateLimitStateRepositoryTrait;
use crate::errors::AppError;

pub struct RateLimitStateManager<R: RateLimitStateRepositoryTrait> {
    pub(crate) repo: Arc<R>,
    policies: RateLimitPolicies,
    fail_open: bool,
}

impl<R: RateLimitStateRepositoryTrait> RateLimitStateManager<R> {
    pub fn new(repo: Arc<R>, policies: RateLimitPolicies, fail_open: bool) -> Self {
        Self {
            repo,
            policies,
            fail_open,
        }
    }

    pub async fn admit(&self, identity: &str, route: LimitedRoute) -> Result<(), AppError> {
        self.admit_at(identity, route, Utc::now()).await
    }

    /// Admit or reject one request from `identity` on `route`.
    ///
    /// Admission records the hit in the global and route scopes; rejection
    /// records nothing.
    pub async fn admit_at(
        &self,
        identity: &str,
        route: LimitedRoute,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let policies = &self.policies;
        let outcome = self
            .repo
            .update(|state| state.check_and_record(identity, route, policies, now))
            .await;

        match outcome {
            Ok(AdmissionDecision::Admitted) => {
                debug!(identity, route = route.as_str(), "request admitted");
                Ok(())
            }
            Ok(AdmissionDecision::Rejected { policy, retry_after }) => {
                warn!(
                    identity,
                    route = route.as_str(),
                    policy = %policy,
                    "rate limit exceeded"
                );
                // round up so the client never retries a moment too early
                let millis = retry_after.num_milliseconds().max(0) as u64;
                Err(AppError::RateLimitExceeded {
                    policy: policy.to_string(),
                    retry_after_secs: millis.div_ceil(1000).max(1),
                })
            }
            Err(e) if self.fail_open => {
                warn!(?e, identity, "rate limit store unavailable, admitting (fail-open)");
                Ok(())
            }
            Err(e) => {
                error!(?e, identity, "rate limit store unavailable, rejecting (fail-closed)");
                Err(AppError::RateLimitUnavailable(format!(
                    "rate limit store unavailable: {}",
                    e
                )))
            }
        }
    }

    /// Live hit count for the identity in the scope's longest window.
    pub async fn usage_at(
        &self,
        identity: &str,
        scope: RateLimitScope,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let policies = &self.policies;
        self.repo
            .read(|state| state.usage(identity, scope, policies, now))
            .await
    }

    /// Evict records whose hits have all aged out.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let policies = &self.policies;
        self.repo.update(|state| state.sweep(policies, now)).await
    }
}
