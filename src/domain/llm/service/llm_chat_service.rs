// src/domain/llm/service/llm_chat_service.rs
use anyhow::{anyhow, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::client::llm_client::LlmClient;
use crate::domain::llm::dto::llm_chat_request::LlmChatRequest;
use crate::domain::llm::dto::llm_chat_response::first_choice_message;

/// Forward a validated chat request to the provider.
pub async fn chat(client: &dyn LlmClient, request: LlmChatRequest) -> Result<Value> {
    info!("Processing chat request with model: {}", request.model);

    let response = client
        .create_chat_completion(&request)
        .await
        .map_err(|e| anyhow!("{} (model={})", e, request.model))?;

    if let Some(reply) = first_choice_message(&response) {
        debug!(reply = %trim_str(reply, 200), "provider replied");
    }

    Ok(response)
}

fn trim_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...<truncated>", &s[..idx]),
    }
}
