use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::domain::llm::dto::llm_chat_request::LlmChatRequest;

/// Completion provider seen by the gateway.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One chat completion call; the provider's JSON is returned untouched.
    async fn create_chat_completion(&self, request: &LlmChatRequest) -> Result<Value>;

    /// Every model id the provider offers, in provider order.
    async fn list_models(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct ModelPage {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// OpenAI-compatible HTTP provider.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(cfg: &GatewayConfig) -> Result<Self> {
        Self::new(
            &cfg.upstream_base_url,
            cfg.require_api_key()?,
            cfg.upstream_timeout,
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn create_chat_completion(&self, request: &LlmChatRequest) -> Result<Value> {
        let url = self.endpoint("chat/completions");
        debug!(%url, model = %request.model, messages = request.messages.len(), "calling provider");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call provider (url={}): {}", url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Provider returned {}: {}", status, provider_message(&text)));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| anyhow!("Failed to decode provider response (url={}): {}", url, e))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.endpoint("models");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call provider (url={}): {}", url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Provider returned {}: {}", status, provider_message(&text)));
        }

        let page: ModelPage = resp
            .json()
            .await
            .map_err(|e| anyhow!("Failed to decode provider model list (url={}): {}", url, e))?;

        Ok(page.data.into_iter().map(|m| m.id).collect())
    }
}

/// Prefer `error.message` from an OpenAI-style error body, else the raw text.
fn provider_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.trim().to_string())
}
