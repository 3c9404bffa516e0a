use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{policy}")]
    RateLimitExceeded {
        policy: String,
        retry_after_secs: u64,
    },

    #[error("{0}")]
    RateLimitUnavailable(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    NotFound(String),
}

/// Helper for mapping any unknown error into internal error
pub fn internal_error<E: ToString>(err: E) -> AppError {
    AppError::Internal(err.to_string())
}

/// Helper for mapping a provider-side failure, keeping its message text
pub fn upstream_error<E: ToString>(err: E) -> AppError {
    AppError::Upstream(err.to_string())
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::RateLimitUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Short label placed in the `error` field of the envelope.
    pub fn label(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Invalid request",
            AppError::RateLimitExceeded { .. } => "Rate limit exceeded",
            AppError::RateLimitUnavailable(_) => "Rate limiter unavailable",
            AppError::Upstream(_) => "Error processing request",
            AppError::Internal(_) => "An unexpected error occurred",
            AppError::NotFound(_) => "Not found",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "{}", self.label());
        }

        let body = Json(json!({
            "error": self.label(),
            "details": self.to_string(),
        }));

        let mut response = (status, body).into_response();

        if let AppError::RateLimitExceeded { retry_after_secs, .. } = &self {
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_maps_to_400_envelope() {
        let (status, _, json) = body_json(AppError::Validation("missing messages field".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid request");
        assert_eq!(json["details"], "missing messages field");
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let (status, headers, json) = body_json(AppError::RateLimitExceeded {
            policy: "30 per 1 minute".into(),
            retry_after_secs: 42,
        })
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "42");
        assert_eq!(json["details"], "30 per 1 minute");
    }

    #[tokio::test]
    async fn upstream_keeps_provider_text() {
        let (status, _, json) = body_json(upstream_error("OpenAI returned 401: invalid key")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Error processing request");
        assert_eq!(json["details"], "OpenAI returned 401: invalid key");
    }
}
