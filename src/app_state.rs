use std::sync::Arc;

use serde_json::Value;

use crate::config::GatewayConfig;
use crate::core::client::llm_client::{LlmClient, OpenAiClient};
use crate::core::state::runtime::rate_limit::rate_limit_policy::RateLimitPolicies;
use crate::core::state::runtime::rate_limit::rate_limit_state_manager::RateLimitStateManager;
use crate::core::state::runtime::rate_limit::rate_limit_state_repository::RateLimitStateRepository;
use crate::domain::llm::dto::llm_chat_request::LlmChatRequest;
use crate::domain::llm::service::{llm_chat_service, llm_model_service, llm_request_validator};
use crate::errors::AppError;

pub type RateLimiter = RateLimitStateManager<RateLimitStateRepository>;

#[derive(Clone)]
pub struct AppState {
    pub llm_service: Arc<LlmService>,
    pub rate_limiter: Arc<RateLimiter>,
}

/// Build process-wide state once at startup.
pub fn build_app_state(config: &GatewayConfig) -> anyhow::Result<AppState> {
    let client = OpenAiClient::from_config(config)?;
    Ok(build_app_state_with(
        Arc::new(client),
        RateLimitPolicies::default(),
        config,
    ))
}

pub fn build_app_state_with(
    client: Arc<dyn LlmClient>,
    policies: RateLimitPolicies,
    config: &GatewayConfig,
) -> AppState {
    AppState {
        llm_service: Arc::new(LlmService::new(client, config.default_model.clone())),
        rate_limiter: Arc::new(RateLimitStateManager::new(
            RateLimitStateRepository::new().shared(),
            policies,
            config.rate_limit_fail_open,
        )),
    }
}

pub struct LlmService {
    client: Arc<dyn LlmClient>,
    default_model: String,
}

impl LlmService {
    pub fn new(client: Arc<dyn LlmClient>, default_model: String) -> Self {
        Self {
            client,
            default_model,
        }
    }

    pub fn validate(&self, body: Option<&Value>) -> Result<LlmChatRequest, AppError> {
        llm_request_validator::validate_chat_request(body, &self.default_model)
    }

    pub async fn chat(&self, request: LlmChatRequest) -> anyhow::Result<Value> {
        llm_chat_service::chat(self.client.as_ref(), request).await
    }

    pub async fn list_chat_models(&self) -> anyhow::Result<Vec<String>> {
        llm_model_service::list_chat_models(self.client.as_ref()).await
    }
}
