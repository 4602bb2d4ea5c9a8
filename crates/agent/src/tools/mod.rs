//! Named async tools and their execution boundary.
//!
//! The registry owns every tool the system knows about; each agent binds a
//! named subset. The executor is the failure boundary: a tool that errors
//! produces an error-valued [`ToolCallResult`] in place, never a failed
//! batch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dispatch_core::{ToolCallRequest, ToolCallResult, ToolDefinition};
use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod client;
pub mod documents;
pub mod infrastructure;
pub mod payments;

pub use client::{HttpTool, RouteSpec, ServiceClient};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool `{0}` is already registered")]
    Duplicate(String),
    #[error("invalid tool invocation: {0}")]
    Invocation(String),
    #[error("upstream service failure: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError>;
}

/// All tools known to the system, keyed by unique name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, tool: T) -> Result<(), ToolError>
    where
        T: Tool + 'static,
    {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Definitions for a named subset, in the order the names are given.
    /// Unknown names are skipped; the agent advertises what actually exists.
    pub fn definitions_for(&self, names: &[&str]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|tool| tool.definition().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Runs a proposed batch. Calls execute concurrently but results come back
/// in request order, so feedback to the LLM is stable.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute_all(&self, requests: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        join_all(requests.iter().map(|request| self.execute_one(request))).await
    }

    pub async fn execute_one(&self, request: &ToolCallRequest) -> ToolCallResult {
        let Some(tool) = self.registry.get(&request.tool_name) else {
            warn!(
                event_name = "tool_unknown",
                tool = %request.tool_name,
                call_id = %request.call_id,
                "requested tool is not registered"
            );
            return ToolCallResult::error(
                &request.tool_name,
                request.arguments.clone(),
                format!("unknown tool: {}", request.tool_name),
            );
        };

        debug!(
            event_name = "tool_execute",
            tool = %request.tool_name,
            call_id = %request.call_id,
        );
        match tool.execute(&request.arguments).await {
            Ok(value) => ToolCallResult::success(&request.tool_name, request.arguments.clone(), value),
            Err(err) => {
                warn!(
                    event_name = "tool_failed",
                    tool = %request.tool_name,
                    call_id = %request.call_id,
                    error = %err,
                );
                ToolCallResult::error(&request.tool_name, request.arguments.clone(), err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use dispatch_core::{ToolCallRequest, ToolDefinition};
    use serde_json::{json, Value};

    use super::{Tool, ToolError, ToolExecutor, ToolRegistry};

    struct EchoTool {
        definition: ToolDefinition,
    }

    impl EchoTool {
        fn new(name: &str) -> Self {
            Self { definition: ToolDefinition::new(name, "Echo arguments back") }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
            Ok(json!({"echo": arguments}))
        }
    }

    struct FailingTool {
        definition: ToolDefinition,
    }

    #[async_trait]
    impl Tool for FailingTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, _arguments: &Value) -> Result<Value, ToolError> {
            Err(ToolError::Invocation("missing required argument".to_string()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::new("echo")).expect("register echo");
        registry
            .register(FailingTool {
                definition: ToolDefinition::new("always_fails", "Always fails"),
            })
            .expect("register always_fails");
        registry
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = registry();
        let err = registry.register(EchoTool::new("echo")).expect_err("duplicate");
        assert!(matches!(err, ToolError::Duplicate(name) if name == "echo"));
    }

    #[test]
    fn definitions_follow_requested_order_and_skip_unknown() {
        let registry = registry();
        let definitions = registry.definitions_for(&["always_fails", "missing", "echo"]);
        let names: Vec<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["always_fails", "echo"]);
    }

    #[tokio::test]
    async fn batch_results_preserve_request_order() {
        let executor = ToolExecutor::new(Arc::new(registry()));
        let requests = vec![
            ToolCallRequest::new("echo", json!({"n": 1})),
            ToolCallRequest::new("always_fails", json!({})),
            ToolCallRequest::new("echo", json!({"n": 2})),
        ];
        let results = executor.execute_all(&requests).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert!(results[2].is_success());
        assert_eq!(results[0].result_value()["echo"]["n"], 1);
        assert_eq!(results[2].result_value()["echo"]["n"], 2);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_an_error_result() {
        let executor = ToolExecutor::new(Arc::new(registry()));
        let requests = vec![ToolCallRequest::new("nope", json!({}))];
        let results = executor.execute_all(&requests).await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].is_success());
        assert_eq!(results[0].result_value()["error"], "unknown tool: nope");
    }

    #[tokio::test]
    async fn tool_failure_is_contained_as_data() {
        let executor = ToolExecutor::new(Arc::new(registry()));
        let result = executor
            .execute_one(&ToolCallRequest::new("always_fails", json!({})))
            .await;
        assert!(!result.is_success());
        assert!(result.result_value()["error"]
            .as_str()
            .expect("error text")
            .contains("missing required argument"));
    }
}
