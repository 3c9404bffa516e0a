use anyhow::Result;
use axum::body::Bytes;
use axum::Json;
use serde_json::Value;

use crate::errors::{upstream_error, AppError};

/// Decode a raw request body. An empty body decodes to `None`.
pub fn decode_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::Validation(format!("request body is not valid JSON: {}", e)))
}

/// Map a provider-facing Result<T> into Json<T>, keeping the provider's error text.
pub fn upstream_json<T: serde::Serialize>(result: Result<T>) -> Result<Json<T>, AppError> {
    match result {
        Ok(value) => Ok(Json(value)),
        Err(err) => Err(upstream_error(err)),
    }
}
