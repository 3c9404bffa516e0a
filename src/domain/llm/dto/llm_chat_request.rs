use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

/// Chat payload as sent by the caller. Everything but `messages` is optional;
/// unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LlmChatRequestBody {
    #[validate(length(min = 1, message = "messages must contain at least one message"))]
    pub messages: Option<Vec<LlmMessage>>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Chat completion payload forwarded to the provider, defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmChatRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}
