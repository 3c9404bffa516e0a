pub mod rate_limit_policy;
pub mod rate_limit_state;
pub mod rate_limit_state_manager;
pub mod rate_limit_state_repository;
pub mod rate_limit_state_repository_trait;
