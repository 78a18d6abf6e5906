//! HTTP API server exposing the chat agent and the Canvas tools.
//!
//! Provides the `/api/chat`, `/api/health` and `/api/tool_test` endpoints
//! and serves the static frontend when the configured directory exists.

use crate::agent::{Agent, ToolCall, ToolContext};
use crate::canvas::CanvasClient;
use crate::cli::Output;
use crate::config::{parse_flag, Settings};
use crate::error::LekseError;
use crate::openai::LlmConfig;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};
use uuid::Uuid;

/// Shared application state; read-only after startup.
struct AppState {
    settings: Settings,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let frontend_dir = settings.frontend_dir();
    let state = Arc::new(AppState { settings });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/tool_test", post(tool_test))
        .layer(cors)
        .with_state(state);

    if frontend_dir.is_dir() {
        app = app.fallback_service(ServeDir::new(&frontend_dir));
    }

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Lekse API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /api/health");
    Output::kv("Chat", "POST /api/chat");
    Output::kv("Tool test", "POST /api/tool_test");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    /// User question
    #[serde(default)]
    message: Option<String>,
    /// Canvas API token, supplied by the frontend with every request
    #[serde(default)]
    canvas_token: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Deserialize)]
struct ToolTestRequest {
    /// Tool name: list_my_courses | get_upcoming_assignments | get_announcements
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    canvas_token: Option<String>,
    /// Optional course name for get_announcements
    #[serde(default)]
    course_name: Option<String>,
}

#[derive(Serialize)]
struct ToolTestResponse {
    result: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Response {
    let message = match req.message.as_deref().map(str::trim) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => return bad_request("Missing required field: message"),
    };
    let canvas_token = match req.canvas_token.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return bad_request("Missing Canvas token; set it in the frontend first"),
    };

    let settings = &state.settings;

    // Per-request overrides shadow the process defaults; nothing shared is
    // ever mutated.
    let llm_base = header_value(&headers, "x-llm-base").or_else(|| settings.llm.base_url.clone());
    let llm_key = header_value(&headers, "x-llm-key").or_else(|| settings.llm.api_key.clone());
    let llm_model =
        header_value(&headers, "x-llm-model").unwrap_or_else(|| settings.llm.model.clone());
    let verbose = header_value(&headers, "x-agent-verbose")
        .map(|v| parse_flag(&v))
        .unwrap_or(settings.agent.verbose);
    let request_id =
        header_value(&headers, "x-request-id").unwrap_or_else(|| Uuid::new_v4().to_string());

    let Some(llm_base) = llm_base else {
        return error_response(LekseError::Config(
            "LLM_BASE_URL is not configured and no X-LLM-BASE header was provided".to_string(),
        ));
    };
    let Some(llm_key) = llm_key else {
        return error_response(LekseError::Config(
            "LLM_API_KEY is not configured and no X-LLM-KEY header was provided".to_string(),
        ));
    };
    let Some(canvas_base) = settings.canvas.base_url.clone() else {
        return error_response(LekseError::Config(
            "CANVAS_BASE_URL is not configured, e.g. https://your-school.instructure.com"
                .to_string(),
        ));
    };

    if verbose {
        info!(request_id = %request_id, model = %llm_model, "chat request: {}", message);
    }

    let llm = LlmConfig {
        base_url: llm_base,
        api_key: llm_key,
        model: llm_model,
    };

    let client = match CanvasClient::new(&canvas_base, &canvas_token, &request_id) {
        Ok(c) => c,
        Err(e) => return error_response(e),
    };
    let tools = ToolContext::new(Arc::new(client), &request_id);

    let agent = Agent::new(tools, &llm)
        .with_max_iterations(settings.agent.max_iterations)
        .with_verbose(verbose);

    match agent.run(&message).await {
        Ok(response) if response.content.trim().is_empty() => {
            warn!(request_id = %request_id, "empty answer from LLM");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "The LLM returned an empty answer; check the LLM configuration and retry"
                        .to_string(),
                }),
            )
                .into_response()
        }
        Ok(response) => Json(ChatResponse {
            answer: response.content,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn tool_test(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ToolTestRequest>,
) -> Response {
    let canvas_token = match req.canvas_token.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return bad_request("Missing Canvas token; set it in the frontend first"),
    };

    let tool = match req.tool.as_deref().map(str::trim) {
        Some("list_my_courses") => ToolCall::ListMyCourses,
        Some("get_upcoming_assignments") => ToolCall::GetUpcomingAssignments,
        Some("get_announcements") => ToolCall::GetAnnouncements {
            course_name: req
                .course_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        },
        Some(other) => return bad_request(&format!("Unknown tool name: {}", other)),
        _ => return bad_request("Missing required field: tool"),
    };

    let Some(canvas_base) = state.settings.canvas.base_url.clone() else {
        return error_response(LekseError::Config(
            "CANVAS_BASE_URL is not configured, e.g. https://your-school.instructure.com"
                .to_string(),
        ));
    };

    let request_id =
        header_value(&headers, "x-request-id").unwrap_or_else(|| Uuid::new_v4().to_string());

    let client = match CanvasClient::new(&canvas_base, &canvas_token, &request_id) {
        Ok(c) => c,
        Err(e) => return error_response(e),
    };
    let tools = ToolContext::new(Arc::new(client), &request_id);

    match tools.execute(&tool).await {
        Ok(result) => Json(ToolTestResponse { result }).into_response(),
        Err(e) => error_response(e),
    }
}

// === Helpers ===

/// Read a non-empty header value as a string.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn bad_request(msg: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}

/// Map an error to an HTTP status and a safe JSON body.
///
/// Bodies name the failing subsystem; the Canvas token is never part of any
/// error message. Unexpected kinds get a generic body with no detail.
fn error_response(err: LekseError) -> Response {
    let status = match &err {
        LekseError::Auth(_) => StatusCode::UNAUTHORIZED,
        LekseError::NotFound(_) => StatusCode::NOT_FOUND,
        LekseError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        LekseError::Upstream(_) | LekseError::Parse(_) | LekseError::Agent(_) => {
            StatusCode::BAD_GATEWAY
        }
        LekseError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error".to_string(),
                }),
            )
                .into_response()
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_static_ok() {
        let response = health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }

    #[test]
    fn test_error_response_status_mapping() {
        let cases = [
            (
                LekseError::Auth("token rejected".to_string()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                LekseError::NotFound("course".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                LekseError::Timeout("canvas".to_string()),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                LekseError::Upstream("500".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                LekseError::Parse("bad json".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                LekseError::Agent("did not converge".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                LekseError::Config("missing".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(error_response(err).status(), expected);
        }
    }

    #[tokio::test]
    async fn test_unexpected_error_body_is_generic() {
        let err = LekseError::Io(std::io::Error::other("disk exploded"));
        let response = error_response(err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn test_header_value_trims_and_drops_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-llm-model", " gpt-4o ".parse().unwrap());
        headers.insert("x-llm-base", "".parse().unwrap());

        assert_eq!(
            header_value(&headers, "x-llm-model").as_deref(),
            Some("gpt-4o")
        );
        assert_eq!(header_value(&headers, "x-llm-base"), None);
        assert_eq!(header_value(&headers, "x-llm-key"), None);
    }
}
