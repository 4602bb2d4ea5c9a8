//! Orchestrator facade.
//!
//! The single entry point the HTTP layer talks to. It wraps the workflow
//! engine with a hard per-request deadline and folds every internal failure
//! mode into one externally shaped [`RequestOutcome`], so callers never see
//! a bare error.

use std::sync::Arc;
use std::time::Duration;

use dispatch_core::{ChatMessage, ToolCallResult, WorkflowState};
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;
use tracing::warn;

use crate::workflow::WorkflowEngine;

/// One executed tool call as shown to API clients.
#[derive(Clone, Debug, Serialize)]
pub struct ToolResultView {
    pub tool: String,
    pub args: Value,
    pub result: Value,
}

impl From<&ToolCallResult> for ToolResultView {
    fn from(result: &ToolCallResult) -> Self {
        Self {
            tool: result.tool_name.clone(),
            args: result.arguments.clone(),
            result: result.result_value(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RequestOutcome {
    pub query: String,
    pub service_type: String,
    pub response: String,
    pub tool_results: Vec<ToolResultView>,
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestOutcome {
    fn from_state(state: WorkflowState) -> Self {
        let status = if state.succeeded { "ok" } else { "error" };
        Self {
            service_type: state
                .service_type
                .map(|category| category.as_str().to_string())
                .unwrap_or_else(|| "error".to_string()),
            response: state.response_text,
            tool_results: state.tool_results.iter().map(ToolResultView::from).collect(),
            success: state.succeeded,
            status: status.to_string(),
            error: state.error,
            query: state.query,
        }
    }

    fn failure(query: &str, error: String, response: &str) -> Self {
        Self {
            query: query.to_string(),
            service_type: "error".to_string(),
            response: response.to_string(),
            tool_results: Vec::new(),
            success: false,
            status: "error".to_string(),
            error: Some(error),
        }
    }
}

pub struct Orchestrator {
    engine: Arc<WorkflowEngine>,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(engine: Arc<WorkflowEngine>, deadline: Duration) -> Self {
        Self { engine, deadline }
    }

    /// Route one request end to end. Never returns an error: routing
    /// failures and deadline overruns come back as shaped error outcomes.
    /// On timeout the in-flight work is dropped with its future.
    pub async fn route_request(
        &self,
        query: &str,
        user_id: Option<String>,
        history: Vec<ChatMessage>,
    ) -> RequestOutcome {
        match timeout(self.deadline, self.engine.invoke(query, user_id, history)).await {
            Ok(Ok(state)) => RequestOutcome::from_state(state),
            Ok(Err(err)) => {
                warn!(event_name = "orchestrate_routing_failed", error = %err);
                RequestOutcome::failure(
                    query,
                    err.to_string(),
                    "This request could not be routed to a service agent.",
                )
            }
            Err(_) => {
                warn!(
                    event_name = "orchestrate_timeout",
                    deadline_secs = self.deadline.as_secs_f64(),
                );
                RequestOutcome::failure(
                    query,
                    format!("request exceeded the {:?} deadline", self.deadline),
                    "The request took too long and was cancelled. Please try again.",
                )
            }
        }
    }
}
