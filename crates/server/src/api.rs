//! JSON API routes.
//!
//! Endpoints:
//! - `POST /orchestrate` — route one query through the full pipeline
//! - `POST /chat`        — conversational surface with optional history
//! - `GET  /`            — service card
//!
//! Both POST surfaces delegate to the orchestrator facade, which never
//! returns an error; handlers are pure request/response shaping.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use dispatch_agent::{Orchestrator, RequestOutcome, ToolResultView};
use dispatch_core::{ChatMessage, ChatRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(service_card))
        .route("/orchestrate", post(orchestrate))
        .route("/chat", post(chat))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct OrchestrateRequest {
    pub query: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub service_type: String,
    pub action: String,
    pub result: Value,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceCard {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn service_card() -> Json<ServiceCard> {
    Json(ServiceCard {
        name: "dispatch-server",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: &["POST /orchestrate", "POST /chat", "GET /health", "GET /"],
    })
}

pub async fn orchestrate(
    State(state): State<ApiState>,
    Json(request): Json<OrchestrateRequest>,
) -> Json<RequestOutcome> {
    info!(
        event_name = "api_orchestrate",
        query_len = request.query.len(),
        has_user = request.user_id.is_some(),
    );
    // `params` and `context` are accepted for wire compatibility; routing is
    // driven by the query text alone.
    let _ = (&request.params, &request.context);
    let outcome = state.orchestrator.route_request(&request.query, request.user_id, Vec::new()).await;
    Json(outcome)
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    info!(
        event_name = "api_chat",
        history_turns = request.conversation_history.len(),
        has_session = request.session_id.is_some(),
    );
    let history: Vec<ChatMessage> =
        request.conversation_history.iter().map(history_message).collect();
    let outcome =
        state.orchestrator.route_request(&request.message, request.user_id, history).await;
    Json(chat_response(outcome))
}

/// Unknown roles fold to `user` rather than rejecting the whole request.
fn history_message(turn: &ChatTurn) -> ChatMessage {
    let role = match turn.role.to_lowercase().as_str() {
        "assistant" => ChatRole::Assistant,
        "system" => ChatRole::System,
        "tool" => ChatRole::Tool,
        _ => ChatRole::User,
    };
    ChatMessage { role, content: turn.content.clone() }
}

fn chat_response(outcome: RequestOutcome) -> ChatResponse {
    let action = outcome
        .tool_results
        .first()
        .map(|view| view.tool.clone())
        .unwrap_or_else(|| "direct_answer".to_string());
    let result = match outcome.tool_results.as_slice() {
        [] => Value::Null,
        results => Value::Array(results.iter().map(tool_result_json).collect()),
    };
    ChatResponse {
        message: outcome.response,
        service_type: outcome.service_type,
        action,
        result,
        success: outcome.success,
    }
}

fn tool_result_json(view: &ToolResultView) -> Value {
    serde_json::json!({
        "tool": view.tool,
        "args": view.args,
        "result": view.result,
    })
}
