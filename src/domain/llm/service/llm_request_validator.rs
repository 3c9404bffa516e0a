use serde_json::Value;
use validator::Validate;

use crate::domain::llm::dto::llm_chat_request::{
    LlmChatRequest, LlmChatRequestBody, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
use crate::errors::AppError;

pub const MISSING_MESSAGES: &str = "missing messages field";

/// Turn a decoded request body into a forwardable chat request.
///
/// Only shape is checked here. Numeric ranges are left to the provider.
pub fn validate_chat_request(
    body: Option<&Value>,
    default_model: &str,
) -> Result<LlmChatRequest, AppError> {
    let Some(body) = body.filter(|b| b.get("messages").is_some_and(|m| !m.is_null())) else {
        return Err(AppError::Validation(MISSING_MESSAGES.into()));
    };

    let parsed: LlmChatRequestBody = serde_json::from_value(body.clone())
        .map_err(|e| AppError::Validation(format!("malformed request: {}", e)))?;
    parsed
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let messages = parsed
        .messages
        .ok_or_else(|| AppError::Validation(MISSING_MESSAGES.into()))?;

    Ok(LlmChatRequest {
        // only an absent or null model takes the default; any string is forwarded as given
        model: parsed.model.unwrap_or_else(|| default_model.to_string()),
        messages,
        temperature: parsed.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: parsed.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    })
}
