//! Versioned JSON API: chat, tool catalogue and session transcripts.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use devpilot_agent::{Assistant, ReplyStatus};
use devpilot_core::error::{Error, SessionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

const CORRUPTED_REPLY: &str =
    "Sorry, the history of this conversation is damaged and I can't continue it. Please start a new session.";
const INTERNAL_REPLY: &str = "Sorry, something went wrong on my side. Please try again.";

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub assistant: Arc<Assistant>,
    /// Bearer tokens for API authentication; empty disables the check.
    pub bearer_tokens: Vec<String>,
}

pub type SharedApiState = Arc<ApiV1State>;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/tools", get(list_tools_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .with_state(state)
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub status: ReplyStatus,
    pub tool_invocations: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// User-facing text for failures that still deserve a reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub count: usize,
    pub tools: Vec<ToolInfo>,
}

fn error_response(status: StatusCode, error: impl Into<String>, reply: Option<&str>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            reply: reply.map(str::to_string),
        }),
    )
        .into_response()
}

/// Map assistant failures onto HTTP statuses.
fn failure_response(err: Error) -> Response {
    match err {
        Error::Session(SessionError::InvalidInput(msg)) => error_response(StatusCode::BAD_REQUEST, msg, None),
        Error::Session(e @ SessionError::Busy(_)) => error_response(StatusCode::CONFLICT, e.to_string(), None),
        Error::Session(e @ SessionError::Corrupted { .. }) => {
            error!(error = %e, "Refusing to continue corrupted session");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), Some(CORRUPTED_REPLY))
        }
        other => {
            error!(error = %other, "Chat request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string(), Some(INTERNAL_REPLY))
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed chat request");
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return error_response(status, rejection.body_text(), None);
        }
    };

    info!(session_id = %payload.session_id, "v1/chat request");

    let reply = match state.assistant.respond(&payload.session_id, &payload.message).await {
        Ok(reply) => reply,
        Err(e @ Error::Session(SessionError::Archive(_))) => {
            error!(session_id = %payload.session_id, error = %e, "Chat request failed");
            return error_response(StatusCode::OK, e.to_string(), Some(INTERNAL_REPLY));
        }
        Err(e) => return failure_response(e),
    };

    // Only a message that made no tool calls is safe to retry.
    if reply.status == ReplyStatus::ModelUnavailable && reply.tool_invocations == 0 {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "model unavailable", Some(&reply.text));
    }

    Json(ChatResponse {
        session_id: payload.session_id.trim().to_string(),
        reply: reply.text,
        status: reply.status,
        tool_invocations: reply.tool_invocations,
    })
    .into_response()
}

async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolInfo> = state
        .assistant
        .tool_definitions()
        .into_iter()
        .map(|d| ToolInfo {
            name: d.name,
            description: d.description,
            parameters: d.parameters,
        })
        .collect();
    Json(ToolListResponse {
        count: tools.len(),
        tools,
    })
}

async fn get_session_handler(State(state): State<SharedApiState>, Path(id): Path<String>) -> Response {
    match state.assistant.transcript(&id).await {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("session '{id}' not found"), None),
        Err(e) => failure_response(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use devpilot_config::AppConfig;
    use devpilot_core::error::ProviderError;
    use devpilot_core::message::{Message, MessageToolCall};
    use devpilot_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Always answers with the same text, or always fails.
    struct FixedProvider {
        reply: Option<String>,
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            match &self.reply {
                Some(text) => Ok(ProviderResponse {
                    message: Message::assistant(text.clone()),
                    usage: None,
                    model: request.model,
                }),
                None => Err(ProviderError::ApiError {
                    status_code: 502,
                    message: "upstream down".into(),
                }),
            }
        }
    }

    /// Requests one tool call, then fails every later call.
    struct OutageAfterToolProvider {
        calls: std::sync::Mutex<usize>,
    }

    #[async_trait]
    impl Provider for OutageAfterToolProvider {
        fn name(&self) -> &str {
            "outage_after_tool"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > 1 {
                return Err(ProviderError::Network("connection reset".into()));
            }
            Ok(ProviderResponse {
                message: Message::tool_request(MessageToolCall {
                    id: "call_1".into(),
                    name: "create_project".into(),
                    arguments: r#"{"name":"Apollo"}"#.into(),
                }),
                usage: None,
                model: request.model,
            })
        }
    }

    /// Project service stand-in that counts create requests.
    async fn spawn_backend() -> (String, Arc<std::sync::Mutex<usize>>) {
        let creates = Arc::new(std::sync::Mutex::new(0usize));
        let app = Router::new()
            .route(
                "/api/agent/projects/new",
                post(|State(creates): State<Arc<std::sync::Mutex<usize>>>| async move {
                    *creates.lock().unwrap() += 1;
                    Json(serde_json::json!({ "projectId": 11, "projectName": "Apollo" }))
                }),
            )
            .with_state(creates.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), creates)
    }

    fn state_with(reply: Option<&str>) -> SharedApiState {
        let provider = Arc::new(FixedProvider {
            reply: reply.map(str::to_string),
        });
        let assistant = devpilot_agent::build_assistant_with(&AppConfig::default(), provider).unwrap();
        Arc::new(ApiV1State {
            assistant: Arc::new(assistant),
            bearer_tokens: Vec::new(),
        })
    }

    fn chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn chat_returns_model_answer() {
        let app = v1_router(state_with(Some("Hello! How can I help with your projects?")));
        let response = app
            .oneshot(chat(r#"{"session_id":"s-1","message":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: ChatResponse = body_json(response).await;
        assert_eq!(json.session_id, "s-1");
        assert_eq!(json.reply, "Hello! How can I help with your projects?");
        assert_eq!(json.status, ReplyStatus::Answered);
        assert_eq!(json.tool_invocations, 0);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = v1_router(state_with(Some("unused")));
        let response = app.oneshot(chat(r#"{"session_id":"s-1""#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_message_is_bad_request() {
        let app = v1_router(state_with(Some("unused")));
        let response = app
            .oneshot(chat(r#"{"session_id":"s-1","message":"  "}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: ErrorResponse = body_json(response).await;
        assert!(json.error.contains("message"));
    }

    #[tokio::test]
    async fn model_outage_is_service_unavailable_with_reply() {
        let app = v1_router(state_with(None));
        let response = app
            .oneshot(chat(r#"{"session_id":"s-1","message":"list my projects"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json: ErrorResponse = body_json(response).await;
        assert_eq!(json.reply.as_deref(), Some("I could not process that, please retry."));
    }

    #[tokio::test]
    async fn model_outage_after_backend_write_is_not_retryable() {
        let (base_url, creates) = spawn_backend().await;
        let mut config = AppConfig::default();
        config.backend.base_url = base_url;
        let provider = Arc::new(OutageAfterToolProvider {
            calls: std::sync::Mutex::new(0),
        });
        let assistant = devpilot_agent::build_assistant_with(&config, provider).unwrap();
        let app = v1_router(Arc::new(ApiV1State {
            assistant: Arc::new(assistant),
            bearer_tokens: Vec::new(),
        }));

        let response = app
            .oneshot(chat(r#"{"session_id":"s-2","message":"create project Apollo"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: ChatResponse = body_json(response).await;
        assert_eq!(json.status, ReplyStatus::ModelUnavailable);
        assert_eq!(json.tool_invocations, 1);
        assert!(json.reply.starts_with("I could not process that, please retry."));
        assert!(json.reply.contains("create project: done"), "{}", json.reply);
        assert_eq!(*creates.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn tools_lists_full_catalogue() {
        let app = v1_router(state_with(Some("unused")));
        let response = app
            .oneshot(Request::builder().uri("/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: ToolListResponse = body_json(response).await;
        assert_eq!(json.count, 14);
        assert!(json.tools.iter().any(|t| t.name == "create_project"));
        assert!(json.tools.iter().any(|t| t.name == "update_task_status"));
        let create = json.tools.iter().find(|t| t.name == "create_project").unwrap();
        assert_eq!(create.parameters["required"], serde_json::json!(["name"]));
    }

    #[tokio::test]
    async fn session_transcript_after_chat() {
        let state = state_with(Some("Hi there."));
        let app = v1_router(state.clone());
        app.clone()
            .oneshot(chat(r#"{"session_id":"abc","message":"hello"}"#))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/sessions/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = body_json(response).await;
        let turns = json["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["type"], "user_message");
        assert_eq!(turns[1]["type"], "agent_decision");

        let missing = app
            .oneshot(Request::builder().uri("/sessions/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
