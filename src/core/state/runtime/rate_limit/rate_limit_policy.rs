use std::fmt;

use chrono::Duration;

/// Routes that carry their own per-route limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitedRoute {
    Chat,
    Models,
}

impl LimitedRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitedRoute::Chat => "chat",
            LimitedRoute::Models => "models",
        }
    }
}

/// Which counter group a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    /// Shared across every limited route for one client identity.
    Global,
    Route(LimitedRoute),
}

/// `limit` admissions per sliding `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: usize,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn per_minute(limit: usize) -> Self {
        Self { limit, window: Duration::minutes(1) }
    }

    pub fn per_hour(limit: usize) -> Self {
        Self { limit, window: Duration::hours(1) }
    }

    pub fn per_day(limit: usize) -> Self {
        Self { limit, window: Duration::days(1) }
    }
}

impl fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.num_seconds();
        let window = if secs == 0 {
            format!("{} millisecond", self.window.num_milliseconds())
        } else if secs % 86_400 == 0 {
            format!("{} day", secs / 86_400)
        } else if secs % 3_600 == 0 {
            format!("{} hour", secs / 3_600)
        } else if secs % 60 == 0 {
            format!("{} minute", secs / 60)
        } else {
            format!("{} second", secs)
        };
        write!(f, "{} per {}", self.limit, window)
    }
}

/// Full limit table. Every request must pass the global policies and the
/// policies of its route.
#[derive(Debug, Clone)]
pub struct RateLimitPolicies {
    pub global: Vec<RateLimitPolicy>,
    pub chat: Vec<RateLimitPolicy>,
    pub models: Vec<RateLimitPolicy>,
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            global: vec![RateLimitPolicy::per_day(200), RateLimitPolicy::per_hour(50)],
            chat: vec![RateLimitPolicy::per_minute(30)],
            models: vec![RateLimitPolicy::per_minute(10)],
        }
    }
}

impl RateLimitPolicies {
    pub fn for_scope(&self, scope: RateLimitScope) -> &[RateLimitPolicy] {
        match scope {
            RateLimitScope::Global => &self.global,
            RateLimitScope::Route(LimitedRoute::Chat) => &self.chat,
            RateLimitScope::Route(LimitedRoute::Models) => &self.models,
        }
    }

    /// Longest window in the scope; hits older than this are dead.
    pub fn retention(&self, scope: RateLimitScope) -> Duration {
        self.for_scope(scope)
            .iter()
            .map(|p| p.window)
            .max()
            .unwrap_or_else(Duration::zero)
    }
}
