use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::domain::llm::dto::llm_chat_response::first_choice_message;

/// Runs only when GATEWAY_SMOKE_TEST is set: exercises a running gateway's
/// routes and exits instead of serving.
pub async fn run_smoke(base_url: &str) -> Result<()> {
    info!("🔧 Smoke mode: checking gateway at {}", base_url);

    let client = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

    let checks = [
        ("Health check", check_health(&client, base_url).await),
        ("Models endpoint", check_models(&client, base_url).await),
        ("Chat endpoint", check_chat(&client, base_url).await),
    ];

    let mut failed = 0;
    for (name, outcome) in checks {
        match outcome {
            Ok(()) => info!("✅ {} passed", name),
            Err(e) => {
                failed += 1;
                error!("❌ {} failed: {}", name, e);
            }
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} smoke check(s) failed", failed));
    }
    info!("Smoke checks completed. Exiting...");
    Ok(())
}

async fn check_health(client: &Client, base_url: &str) -> Result<()> {
    let body = get_ok(client, &format!("{}/health", base_url)).await?;
    info!("Health: {}", body);
    Ok(())
}

async fn check_models(client: &Client, base_url: &str) -> Result<()> {
    let body = get_ok(client, &format!("{}/api/models", base_url)).await?;
    let count = body
        .get("models")
        .and_then(Value::as_array)
        .map(Vec::len)
        .ok_or_else(|| anyhow!("response has no models array: {}", body))?;
    info!("Available models: {}", count);
    Ok(())
}

async fn check_chat(client: &Client, base_url: &str) -> Result<()> {
    let payload = json!({
        "messages": [
            {"role": "system", "content": "You are a helpful assistant."},
            {"role": "user", "content": "Hello, tell me a short joke."}
        ],
        "model": "gpt-3.5-turbo",
        "max_tokens": 100
    });

    let resp = client
        .post(format!("{}/api/chat", base_url))
        .json(&payload)
        .send()
        .await?;
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!("status {}: {}", status, text));
    }

    let body: Value = serde_json::from_str(&text)?;
    match first_choice_message(&body) {
        Some(reply) => info!("Assistant's response: {}", reply),
        None => info!("Chat response had no first choice: {}", body),
    }
    Ok(())
}

async fn get_ok(client: &Client, url: &str) -> Result<Value> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(anyhow!("status {}: {}", status, text));
    }
    Ok(serde_json::from_str(&text)?)
}
