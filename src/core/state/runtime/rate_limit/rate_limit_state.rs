use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::rate_limit_policy::{LimitedRoute, RateLimitPolicies, RateLimitPolicy, RateLimitScope};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub identity: String,
    pub scope: RateLimitScope,
}

/// Admission timestamps for one (identity, scope) pair.
#[derive(Debug, Clone, Default)]
pub struct RateLimitRecord {
    /// Sliding window of admitted request times, oldest first
    pub hits: VecDeque<DateTime<Utc>>,
}

impl RateLimitRecord {
    /// Hits inside `(cutoff, ..]`.
    pub fn count_since(&self, cutoff: DateTime<Utc>) -> usize {
        self.hits.iter().filter(|t| **t > cutoff).count()
    }

    /// Remove timestamps at or before the cutoff
    pub fn prune_older_than(&mut self, cutoff: DateTime<Utc>) {
        self.hits.retain(|t| *t > cutoff);
    }

    /// Time until enough hits leave the window for one more admission.
    fn retry_after(&self, policy: &RateLimitPolicy, now: DateTime<Utc>) -> Duration {
        let cutoff = now - policy.window;
        let mut live: Vec<DateTime<Utc>> =
            self.hits.iter().copied().filter(|t| *t > cutoff).collect();
        live.sort();

        let excess = live.len().saturating_sub(policy.limit);
        match live.get(excess) {
            Some(ts) => (*ts + policy.window) - now,
            None => Duration::zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admitted,
    Rejected {
        policy: RateLimitPolicy,
        retry_after: Duration,
    },
}

/// In-memory limiter counters. Lives only in memory and is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    pub records: HashMap<RateLimitKey, RateLimitRecord>,
}

impl RateLimitState {
    /// Check every policy for the route and, only if all pass, record the hit
    /// in every scope.
    pub fn check_and_record(
        &mut self,
        identity: &str,
        route: LimitedRoute,
        policies: &RateLimitPolicies,
        now: DateTime<Utc>,
    ) -> AdmissionDecision {
        let scopes = [RateLimitScope::Global, RateLimitScope::Route(route)];

        // an identity seen for the first time is checked against an empty log
        let empty = RateLimitRecord::default();
        let mut worst: Option<(RateLimitPolicy, Duration)> = None;
        for scope in scopes {
            let key = RateLimitKey { identity: identity.to_string(), scope };
            let record = self.records.get(&key).unwrap_or(&empty);

            for policy in policies.for_scope(scope) {
                if record.count_since(now - policy.window) < policy.limit {
                    continue;
                }
                let wait = record.retry_after(policy, now);
                if worst.as_ref().map_or(true, |(_, w)| wait > *w) {
                    worst = Some((policy.clone(), wait));
                }
            }
        }

        if let Some((policy, retry_after)) = worst {
            return AdmissionDecision::Rejected { policy, retry_after };
        }

        for scope in scopes {
            let record = self
                .records
                .entry(RateLimitKey { identity: identity.to_string(), scope })
                .or_default();
            record.prune_older_than(now - policies.retention(scope));
            record.hits.push_back(now);
        }

        AdmissionDecision::Admitted
    }

    /// Live hits for the identity in the scope's longest window.
    pub fn usage(
        &self,
        identity: &str,
        scope: RateLimitScope,
        policies: &RateLimitPolicies,
        now: DateTime<Utc>,
    ) -> usize {
        let key = RateLimitKey { identity: identity.to_string(), scope };
        self.records
            .get(&key)
            .map(|r| r.count_since(now - policies.retention(scope)))
            .unwrap_or(0)
    }

    /// Drop expired hits and evict records that became empty.
    /// Returns the number of evicted records.
    pub fn sweep(&mut self, policies: &RateLimitPolicies, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|key, record| {
            record.prune_older_than(now - policies.retention(key.scope));
            !record.hits.is_empty()
        });
        before - self.records.len()
    }
}
