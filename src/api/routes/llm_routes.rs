use axum::{routing::{get, post}, Router};

use crate::api::controller::llm::LlmController;
use crate::app_state::AppState;

pub fn llm_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(LlmController::chat))
        .route("/models", get(LlmController::models))
}
