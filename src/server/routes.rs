//! HTTP route handlers for the fish chat API.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chat::ChatError;
use crate::history::core::errors::HistoryError;
use crate::history::core::ids::SessionKey;
use crate::history::core::turn::Turn;

use super::state::AppState;

/// Error half of every handler result.
type ApiError = (StatusCode, Json<ErrorResponse>);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .route("/api/chat/clear", post(clear_history))
        .route("/api/chat/history", get(chat_history))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fishchat-agent",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.chat.model_name(),
        "sessions": state.chat.registry().len(),
    }))
}

/// Failure body shared by all endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable cause.
    pub error: String,
}

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
}

/// Resolve an optional client-supplied session id, defaulting to `"default"`.
fn session_key(raw: Option<&str>) -> Result<SessionKey, ApiError> {
    raw.map_or_else(
        || Ok(SessionKey::default_session()),
        |id| {
            SessionKey::new(id)
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid session_id: {e}")))
        },
    )
}

/// Unwrap a JSON body, turning extractor rejections into the shared error body.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", rejection.body_text()),
        )
    })
}

fn join_error(err: &tokio::task::JoinError) -> ApiError {
    tracing::error!("Chat worker failed: {err}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
}

/// Chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    #[serde(default)]
    pub message: String,
    /// Session to continue; `"default"` when absent.
    pub session_id: Option<String>,
}

/// Chat response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Always `true`.
    pub success: bool,
    /// The assistant's response.
    pub response: String,
    /// Session the turn was recorded in.
    pub session_id: SessionKey,
}

/// Handle one chat turn.
async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = json_body(payload)?;
    let session_id = session_key(request.session_id.as_deref())?;
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No message provided"));
    }

    let reply = tokio::task::spawn_blocking(move || state.chat.respond(&session_id, &message))
        .await
        .map_err(|e| join_error(&e))?
        .map_err(|e| match e {
            ChatError::History(HistoryError::InvalidTurn(msg)) => {
                api_error(StatusCode::BAD_REQUEST, msg)
            }
            ChatError::History(err) => {
                api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("History error: {err}"))
            }
            ChatError::Provider(err) => {
                api_error(StatusCode::BAD_GATEWAY, format!("LLM error: {err}"))
            }
        })?;

    Ok(Json(ChatResponse {
        success: true,
        response: reply.response,
        session_id: reply.session_id,
    }))
}

/// Clear request.
#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    /// Session to clear; `"default"` when absent.
    pub session_id: Option<String>,
}

/// Clear response.
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    /// Always `true`.
    pub success: bool,
    /// Confirmation text.
    pub message: String,
}

/// Reset a session to its system turn.
async fn clear_history(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> Result<Json<ClearResponse>, ApiError> {
    let request = json_body(payload)?;
    let session_id = session_key(request.session_id.as_deref())?;

    let cleared = tokio::task::spawn_blocking(move || state.chat.clear(&session_id))
        .await
        .map_err(|e| join_error(&e))?;
    if let Err(err) = cleared {
        // The in-memory log is already reset; only the write was lost.
        tracing::warn!("Cleared history was not persisted: {err}");
    }

    Ok(Json(ClearResponse {
        success: true,
        message: "Chat history cleared".to_string(),
    }))
}

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Session to read; `"default"` when absent.
    pub session_id: Option<String>,
}

/// History response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Always `true`.
    pub success: bool,
    /// Conversation turns, oldest first, without the system turn.
    pub history: Vec<Turn>,
    /// Session read.
    pub session_id: SessionKey,
}

/// Return a session's conversation turns.
async fn chat_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let session_id = session_key(query.session_id.as_deref())?;

    let key = session_id.clone();
    let history = tokio::task::spawn_blocking(move || state.chat.history(&key))
        .await
        .map_err(|e| join_error(&e))?;

    Ok(Json(HistoryResponse {
        success: true,
        history,
        session_id,
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::history::core::config::HistoryConfig;
    use crate::history::core::turn::WindowMessage;
    use crate::llm::completion::{CompletionProvider, ProviderError};

    struct EchoProvider;

    impl CompletionProvider for EchoProvider {
        fn complete(&self, messages: &[WindowMessage]) -> Result<String, ProviderError> {
            let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            Ok(format!("Reply to {last}"))
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    struct DownProvider;

    impl CompletionProvider for DownProvider {
        fn complete(&self, _messages: &[WindowMessage]) -> Result<String, ProviderError> {
            Err(ProviderError::HttpStatus {
                status: 503,
                body: "unavailable".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    fn router(dir: &std::path::Path, provider: Arc<dyn CompletionProvider>) -> Router {
        let config = AppConfig {
            history: HistoryConfig::with_chat_dir(dir),
            ..AppConfig::default()
        };
        create_router(AppState::with_provider(&config, provider).unwrap())
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path(), Arc::new(EchoProvider));
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "echo");
    }

    #[tokio::test]
    async fn test_chat_then_history() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path(), Arc::new(EchoProvider));

        let (status, body) = send(
            &app,
            post_json(
                "/api/chat",
                &serde_json::json!({"message": "Tell me about Mola", "session_id": "abc"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["response"], "Reply to Tell me about Mola");
        assert_eq!(body["session_id"], "abc");

        let (status, body) = send(&app, get("/api/chat/history?session_id=abc")).await;
        assert_eq!(status, StatusCode::OK);
        let history = body["history"].as_array().cloned().unwrap_or_default();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[1]["role"], "assistant");
        assert!(history[0]["timestamp"].is_string());

        assert!(dir.path().join("chat_history_abc.json").exists());
    }

    #[tokio::test]
    async fn test_missing_session_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path(), Arc::new(EchoProvider));
        let (status, body) = send(
            &app,
            post_json("/api/chat", &serde_json::json!({"message": "What is Puti?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session_id"], "default");
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path(), Arc::new(EchoProvider));

        let (status, body) = send(&app, post_json("/api/chat", &serde_json::json!({"message": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &app,
            post_json(
                "/api/chat",
                &serde_json::json!({"message": "hi", "session_id": "../etc/passwd"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unusable_bodies_get_error_shape() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path(), Arc::new(EchoProvider));

        let empty = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap();
        let plain = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "text/plain")
            .body(Body::from("What is Puti?"))
            .unwrap();
        let no_header = Request::builder()
            .method("POST")
            .uri("/api/chat/clear")
            .body(Body::empty())
            .unwrap();

        for request in [empty, plain, no_header] {
            let (status, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], false);
            assert!(body["error"].is_string());
        }

        let (status, body) = send(&app, post_json("/api/chat", &serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No message provided");
    }

    #[tokio::test]
    async fn test_provider_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path(), Arc::new(DownProvider));
        let (status, body) = send(
            &app,
            post_json("/api/chat", &serde_json::json!({"message": "hello", "session_id": "s1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);

        let (_, body) = send(&app, get("/api/chat/history?session_id=s1")).await;
        assert_eq!(body["history"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_clear_history() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path(), Arc::new(EchoProvider));
        send(
            &app,
            post_json("/api/chat", &serde_json::json!({"message": "hello", "session_id": "s1"})),
        )
        .await;

        let (status, body) = send(
            &app,
            post_json("/api/chat/clear", &serde_json::json!({"session_id": "s1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = send(&app, get("/api/chat/history?session_id=s1")).await;
        assert_eq!(body["history"].as_array().map(Vec::len), Some(0));
    }
}
