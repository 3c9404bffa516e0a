use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::Value;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::api::dto::llm_dto::ModelListResponse;
use crate::api::util::client_identity::ClientIdentity;
use crate::api::util::json::{decode_body, upstream_json};
use crate::app_state::AppState;
use crate::core::state::runtime::rate_limit::rate_limit_policy::LimitedRoute;
use crate::errors::AppError;

pub struct LlmController;

impl LlmController {
    /// decode -> validate -> admit -> forward
    pub async fn chat(
        State(state): State<AppState>,
        ClientIdentity(identity): ClientIdentity,
        body: Bytes,
    ) -> Result<Json<Value>, AppError> {
        let span = info_span!("chat", request_id = %Uuid::new_v4(), client = %identity);

        async move {
            let payload = decode_body(&body)?;
            let request = state.llm_service.validate(payload.as_ref())?;
            state.rate_limiter.admit(&identity, LimitedRoute::Chat).await?;
            upstream_json(state.llm_service.chat(request).await)
        }
        .instrument(span)
        .await
    }

    pub async fn models(
        State(state): State<AppState>,
        ClientIdentity(identity): ClientIdentity,
    ) -> Result<Json<ModelListResponse>, AppError> {
        let span = info_span!("models", request_id = %Uuid::new_v4(), client = %identity);

        async move {
            state.rate_limiter.admit(&identity, LimitedRoute::Models).await?;
            upstream_json(
                state
                    .llm_service
                    .list_chat_models()
                    .await
                    .map(|models| ModelListResponse { models }),
            )
        }
        .instrument(span)
        .await
    }
}
