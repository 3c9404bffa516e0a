use anyhow::Result;
use tracing::info;

use crate::core::client::llm_client::LlmClient;

/// Model id prefixes that identify chat-capable models.
pub const CHAT_MODEL_PREFIXES: [&str; 2] = ["gpt-", "text-davinci"];

pub async fn list_chat_models(client: &dyn LlmClient) -> Result<Vec<String>> {
    info!("Fetching available models");
    let models = client.list_models().await?;
    Ok(filter_chat_models(models))
}

/// Keep allowlisted ids, preserving provider order.
pub fn filter_chat_models(models: Vec<String>) -> Vec<String> {
    models
        .into_iter()
        .filter(|id| CHAT_MODEL_PREFIXES.iter().any(|p| id.starts_with(p)))
        .collect()
}
