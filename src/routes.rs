use std::any::Any;

use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::api::dto::llm_dto::HealthResponse;
use crate::app_state::AppState;
use crate::errors::{internal_error, AppError};

/// Build the main application router
pub fn app_router() -> Router<AppState> {
    Router::new()
        // Health check, never rate limited and never calls the provider
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes::llm_routes::llm_routes())
        .fallback(handler_404)
        // a panicking handler still answers with the JSON envelope
        .layer(CatchPanicLayer::custom(handle_panic))
        // outermost, so every response carries CORS headers, panics included
        .layer(CorsLayer::very_permissive())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

async fn handler_404() -> AppError {
    AppError::NotFound("The requested resource was not found".into())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    internal_error(details).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{header, HeaderValue, Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::app_state::build_app_state_with;
    use crate::config::GatewayConfig;
    use crate::core::client::llm_client::LlmClient;
    use crate::core::state::runtime::rate_limit::rate_limit_policy::{
        LimitedRoute, RateLimitPolicies, RateLimitPolicy, RateLimitScope,
    };
    use crate::domain::llm::dto::llm_chat_request::{LlmChatRequest, LlmRole};

    #[derive(Default)]
    struct FakeClient {
        chat_calls: AtomicUsize,
        model_calls: AtomicUsize,
        last_request: Mutex<Option<LlmChatRequest>>,
        fail_with: Option<String>,
        panic_on_chat: bool,
    }

    #[async_trait]
    impl LlmClient for FakeClient {
        async fn create_chat_completion(&self, request: &LlmChatRequest) -> Result<Value> {
            self.chat_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if self.panic_on_chat {
                panic!("provider adapter blew up");
            }
            if let Some(msg) = &self.fail_with {
                return Err(anyhow!(msg.clone()));
            }
            Ok(json!({
                "id": "chatcmpl-42",
                "object": "chat.completion",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
            }))
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            self.model_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.fail_with {
                return Err(anyhow!(msg.clone()));
            }
            Ok(vec![
                "whisper-1".into(),
                "gpt-4o".into(),
                "text-davinci-003".into(),
                "dall-e-3".into(),
                "gpt-3.5-turbo".into(),
            ])
        }
    }

    fn policies(chat_per_window: usize, window: Duration) -> RateLimitPolicies {
        RateLimitPolicies {
            global: vec![RateLimitPolicy::per_day(200), RateLimitPolicy::per_hour(50)],
            chat: vec![RateLimitPolicy { limit: chat_per_window, window }],
            models: vec![RateLimitPolicy::per_minute(10)],
        }
    }

    fn setup(client: FakeClient, policies: RateLimitPolicies) -> (Router, AppState, Arc<FakeClient>) {
        let client = Arc::new(client);
        let state = build_app_state_with(client.clone(), policies, &GatewayConfig::default());
        (app_router().with_state(state.clone()), state, client)
    }

    fn addr(last_octet: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last_octet], 40000))
    }

    fn chat_request(from: SocketAddr, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(ConnectInfo(from))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str, from: SocketAddr) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .extension(ConnectInfo(from))
            .body(Body::empty())
            .unwrap()
    }

    const BROWSER_ORIGIN: &str = "http://localhost:3000";

    fn with_origin(mut req: Request<Body>) -> Request<Body> {
        req.headers_mut()
            .insert(header::ORIGIN, HeaderValue::from_static(BROWSER_ORIGIN));
        req
    }

    fn hi() -> Value {
        json!({"messages": [{"role": "user", "content": "hi"}]})
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    async fn usage(state: &AppState, ip: &str, scope: RateLimitScope) -> usize {
        state.rate_limiter.usage_at(ip, scope, Utc::now()).await.unwrap()
    }

    #[tokio::test]
    async fn health_is_independent_of_limiter_and_provider() {
        let (app, state, client) = setup(
            FakeClient { fail_with: Some("down".into()), ..Default::default() },
            policies(0, Duration::minutes(1)),
        );

        for _ in 0..5 {
            let (status, _, body) = send(&app, get_request("/health", addr(1))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"status": "healthy"}));
        }

        assert_eq!(client.chat_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.model_calls.load(Ordering::SeqCst), 0);
        assert_eq!(usage(&state, "10.0.0.1", RateLimitScope::Global).await, 0);
    }

    #[tokio::test]
    async fn missing_messages_is_400_without_outbound_call() {
        let (app, state, client) = setup(FakeClient::default(), RateLimitPolicies::default());

        let (status, _, body) =
            send(&app, chat_request(addr(1), json!({"model": "gpt-4o"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request");
        assert_eq!(body["details"], "missing messages field");

        let empty = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .extension(ConnectInfo(addr(1)))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, empty).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(client.chat_calls.load(Ordering::SeqCst), 0);
        // invalid requests are rejected before admission and use no quota
        assert_eq!(usage(&state, "10.0.0.1", RateLimitScope::Global).await, 0);
    }

    #[tokio::test]
    async fn minimal_chat_uses_defaults_and_returns_provider_json() {
        let (app, _, client) = setup(FakeClient::default(), RateLimitPolicies::default());

        let (status, _, body) = send(&app, chat_request(addr(1), hi())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "chatcmpl-42");
        assert_eq!(body["usage"]["total_tokens"], 4);

        let forwarded = client.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(forwarded.model, "gpt-3.5-turbo");
        assert_eq!(forwarded.temperature, 0.7);
        assert_eq!(forwarded.max_tokens, 1000);
        assert_eq!(forwarded.messages.len(), 1);
        assert_eq!(forwarded.messages[0].role, LlmRole::User);
        assert_eq!(forwarded.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn admitted_requests_count_exactly_once() {
        let (app, state, _) = setup(FakeClient::default(), RateLimitPolicies::default());

        send(&app, chat_request(addr(1), hi())).await;
        send(&app, chat_request(addr(1), hi())).await;
        assert_eq!(usage(&state, "10.0.0.1", RateLimitScope::Global).await, 2);
        assert_eq!(
            usage(&state, "10.0.0.1", RateLimitScope::Route(LimitedRoute::Chat)).await,
            2
        );

        let (status, _, _) = send(&app, get_request("/api/models", addr(1))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(usage(&state, "10.0.0.1", RateLimitScope::Global).await, 3);
        assert_eq!(
            usage(&state, "10.0.0.1", RateLimitScope::Route(LimitedRoute::Models)).await,
            1
        );
    }

    #[tokio::test]
    async fn request_past_chat_limit_is_429_without_outbound_call() {
        let k = 3;
        let (app, _, client) = setup(FakeClient::default(), policies(k, Duration::minutes(1)));

        for _ in 0..k {
            let (status, _, _) = send(&app, chat_request(addr(1), hi())).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, headers, body) = send(&app, chat_request(addr(1), hi())).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded");
        assert_eq!(body["details"], "3 per 1 minute");
        let retry: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry), "retry-after {}", retry);
        assert_eq!(client.chat_calls.load(Ordering::SeqCst), k);

        // another client is unaffected
        let (status, _, _) = send(&app, chat_request(addr(2), hi())).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn blocked_client_is_admitted_after_window() {
        let (app, _, client) =
            setup(FakeClient::default(), policies(1, Duration::milliseconds(200)));

        assert_eq!(send(&app, chat_request(addr(1), hi())).await.0, StatusCode::OK);
        assert_eq!(
            send(&app, chat_request(addr(1), hi())).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );

        tokio::time::sleep(std::time::Duration::from_millis(250)).await;

        assert_eq!(send(&app, chat_request(addr(1), hi())).await.0, StatusCode::OK);
        assert_eq!(client.chat_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn models_are_filtered_in_provider_order() {
        let (app, _, _) = setup(FakeClient::default(), RateLimitPolicies::default());

        let (status, _, body) = send(&app, get_request("/api/models", addr(1))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"models": ["gpt-4o", "text-davinci-003", "gpt-3.5-turbo"]})
        );
    }

    #[tokio::test]
    async fn models_route_has_its_own_limit() {
        let (app, _, client) = setup(FakeClient::default(), RateLimitPolicies::default());

        for _ in 0..10 {
            assert_eq!(
                send(&app, get_request("/api/models", addr(3))).await.0,
                StatusCode::OK
            );
        }
        assert_eq!(
            send(&app, get_request("/api/models", addr(3))).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(client.model_calls.load(Ordering::SeqCst), 10);

        // chat still has room for the same client
        assert_eq!(send(&app, chat_request(addr(3), hi())).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn provider_failure_is_500_with_details() {
        let (app, _, _) = setup(
            FakeClient {
                fail_with: Some("Provider returned 401 Unauthorized: Incorrect API key provided".into()),
                ..Default::default()
            },
            RateLimitPolicies::default(),
        );

        let (status, _, body) = send(&app, chat_request(addr(1), hi())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error processing request");
        assert!(body["details"]
            .as_str()
            .unwrap()
            .contains("Incorrect API key provided"));

        let (status, _, body) = send(&app, get_request("/api/models", addr(1))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].as_str().unwrap().contains("401"));
    }

    #[tokio::test]
    async fn panic_is_converted_to_json_500() {
        let (app, _, _) = setup(
            FakeClient { panic_on_chat: true, ..Default::default() },
            RateLimitPolicies::default(),
        );

        let (status, headers, body) =
            send(&app, with_origin(chat_request(addr(1), hi()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An unexpected error occurred");
        assert_eq!(body["details"], "provider adapter blew up");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], BROWSER_ORIGIN);
    }

    #[tokio::test]
    async fn cross_origin_responses_allow_the_caller() {
        let (app, _, _) = setup(FakeClient::default(), RateLimitPolicies::default());

        let (status, headers, _) = send(&app, with_origin(get_request("/health", addr(1)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], BROWSER_ORIGIN);

        let (status, headers, _) = send(&app, with_origin(chat_request(addr(1), hi()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], BROWSER_ORIGIN);

        let (status, headers, _) =
            send(&app, with_origin(chat_request(addr(1), json!({})))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], BROWSER_ORIGIN);
    }

    #[tokio::test]
    async fn chat_preflight_is_answered_without_admission() {
        let (app, state, client) = setup(FakeClient::default(), RateLimitPolicies::default());

        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header(header::ORIGIN, BROWSER_ORIGIN)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .extension(ConnectInfo(addr(1)))
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&app, preflight).await;

        assert!(status.is_success(), "preflight status {}", status);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], BROWSER_ORIGIN);
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("POST"), "allowed methods {}", methods);
        let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
        assert!(allowed.contains("content-type"), "allowed headers {}", allowed);

        assert_eq!(client.chat_calls.load(Ordering::SeqCst), 0);
        assert_eq!(usage(&state, "10.0.0.1", RateLimitScope::Global).await, 0);
    }

    #[tokio::test]
    async fn requests_without_peer_address_share_unknown_identity() {
        let (app, state, _) = setup(FakeClient::default(), RateLimitPolicies::default());

        let req = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .body(Body::from(hi().to_string()))
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);
        assert_eq!(usage(&state, "unknown", RateLimitScope::Global).await, 1);
    }

    #[tokio::test]
    async fn unknown_route_is_404_envelope() {
        let (app, _, _) = setup(FakeClient::default(), RateLimitPolicies::default());

        let (status, _, body) = send(&app, get_request("/api/nope", addr(1))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }
}
