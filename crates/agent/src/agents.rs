//! Service agents.
//!
//! One generic [`ServiceAgent`] covers every category: a variant is just a
//! (system prompt, tool subset) pair, built by the factory constructors
//! below. The agent drives the two-phase protocol:
//!
//! 1. **Propose** - infer over the full log with the bound tool definitions;
//!    the model either answers or proposes tool calls.
//! 2. **Resolve** - execute the proposed batch, feed each result back as a
//!    tool-role message, and infer once more with no tools bound.
//!
//! At most two LLM round-trips per run. A tool request in the resolve phase
//! is a protocol violation; the agent terminates with a rendering of the
//! tool results instead of looping.

use std::sync::Arc;

use dispatch_core::{ChatMessage, ServiceCategory, ToolCallResult, WorkflowState};
use tracing::{info, warn};

use crate::llm::{InferenceResult, LlmGateway};
use crate::tools::{ToolExecutor, ToolRegistry};

const INQUIRY_PROMPT: &str = "You are a payment operations assistant. You answer questions about \
payments, transactions, settlements, and inquiry tickets. Use the available tools to look up \
real data before answering; never invent payment details. When a tool returns an error, explain \
the failure to the user plainly.";

const GENERAL_PROMPT: &str = "You are a general-purpose assistant for a payment operations team. \
Answer directly and concisely. You have no tools; if a question needs live payment, \
infrastructure, or document data, say which service the user should ask about instead.";

const INFRASTRUCTURE_PROMPT: &str = "You are a search infrastructure assistant. You manage \
search indices and indexed documents. Use the available tools for any index or search \
operation; report tool errors plainly rather than guessing.";

const DOCUMENT_PROMPT: &str = "You are a document management assistant. You help users find, \
inspect, and upload documents. Use the available tools for any document lookup; report tool \
errors plainly rather than guessing.";

pub struct ServiceAgent {
    category: ServiceCategory,
    system_prompt: &'static str,
    tool_names: &'static [&'static str],
    gateway: Arc<dyn LlmGateway>,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
}

impl ServiceAgent {
    pub fn new(
        category: ServiceCategory,
        system_prompt: &'static str,
        tool_names: &'static [&'static str],
        gateway: Arc<dyn LlmGateway>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let executor = ToolExecutor::new(registry.clone());
        Self { category, system_prompt, tool_names, gateway, registry, executor }
    }

    pub fn inquiry(gateway: Arc<dyn LlmGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self::new(
            ServiceCategory::Inquiry,
            INQUIRY_PROMPT,
            crate::tools::payments::TOOL_NAMES,
            gateway,
            registry,
        )
    }

    pub fn general(gateway: Arc<dyn LlmGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self::new(ServiceCategory::General, GENERAL_PROMPT, &[], gateway, registry)
    }

    pub fn infrastructure(gateway: Arc<dyn LlmGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self::new(
            ServiceCategory::Infrastructure,
            INFRASTRUCTURE_PROMPT,
            crate::tools::infrastructure::TOOL_NAMES,
            gateway,
            registry,
        )
    }

    pub fn document(gateway: Arc<dyn LlmGateway>, registry: Arc<ToolRegistry>) -> Self {
        Self::new(
            ServiceCategory::Document,
            DOCUMENT_PROMPT,
            crate::tools::documents::TOOL_NAMES,
            gateway,
            registry,
        )
    }

    pub fn category(&self) -> ServiceCategory {
        self.category
    }

    /// Run one request to a terminal state. Tool failures stay contained as
    /// error-valued results; only gateway failures mark the state failed.
    pub async fn run(&self, mut state: WorkflowState) -> WorkflowState {
        // The log is rebuilt as [system] + history + [current query] so the
        // system prompt always leads, whatever history was threaded in.
        let history = std::mem::take(&mut state.message_log);
        state.push_message(ChatMessage::system(self.system_prompt));
        for message in history {
            state.push_message(message);
        }
        state.push_message(ChatMessage::user(state.query.clone()));

        let tools = self.registry.definitions_for(self.tool_names);
        info!(
            event_name = "agent_run_start",
            category = %self.category,
            provider = self.gateway.provider_name(),
            bound_tools = tools.len(),
        );

        let proposal = match self.gateway.infer(&state.message_log, &tools).await {
            Ok(result) => result,
            Err(err) => {
                warn!(event_name = "agent_propose_failed", category = %self.category, error = %err);
                state.fail(
                    err.to_string(),
                    "I could not reach the language model. Please try again shortly.",
                );
                return state;
            }
        };

        let calls = match proposal {
            InferenceResult::Answer(text) => {
                if text.trim().is_empty() {
                    warn!(event_name = "agent_empty_answer", category = %self.category);
                    state.fail(
                        "model returned an empty answer",
                        "I could not produce an answer for this request. Please try again.",
                    );
                    return state;
                }
                info!(event_name = "agent_direct_answer", category = %self.category);
                state.push_message(ChatMessage::assistant(text.clone()));
                state.complete(text);
                return state;
            }
            InferenceResult::ToolRequest(calls) => calls,
        };

        info!(event_name = "agent_tool_request", category = %self.category, calls = calls.len());
        state.push_message(ChatMessage::assistant(
            serde_json::to_string(&calls).unwrap_or_default(),
        ));
        state.requested_tool_calls = calls;

        let results = self.executor.execute_all(&state.requested_tool_calls).await;
        for result in &results {
            state.push_message(ChatMessage::tool(
                serde_json::to_string(result).unwrap_or_default(),
            ));
        }
        state.tool_results = results;

        // Resolve phase: no tools bound, the model must answer.
        match self.gateway.infer(&state.message_log, &[]).await {
            Ok(InferenceResult::Answer(text)) => {
                if text.trim().is_empty() {
                    // Tool results exist at this point, so render them rather
                    // than terminating with a blank success.
                    warn!(event_name = "agent_empty_answer", category = %self.category);
                    let rendered = render_tool_results(&state.tool_results);
                    state.push_message(ChatMessage::assistant(rendered.clone()));
                    state.complete(rendered);
                } else {
                    info!(event_name = "agent_resolved", category = %self.category);
                    state.push_message(ChatMessage::assistant(text.clone()));
                    state.complete(text);
                }
            }
            Ok(InferenceResult::ToolRequest(_)) => {
                warn!(
                    event_name = "agent_answer_phase_violation",
                    category = %self.category,
                    "model proposed tools in the resolve phase"
                );
                let rendered = render_tool_results(&state.tool_results);
                state.push_message(ChatMessage::assistant(rendered.clone()));
                state.complete(rendered);
            }
            Err(err) => {
                warn!(event_name = "agent_resolve_failed", category = %self.category, error = %err);
                state.fail(
                    err.to_string(),
                    "The requested lookups ran, but I could not compose a final answer.",
                );
            }
        }
        state
    }
}

/// Fallback rendering when the model never produces a final answer: the raw
/// results, one line per call.
fn render_tool_results(results: &[ToolCallResult]) -> String {
    let mut lines = vec![format!("Executed {} tool call(s):", results.len())];
    for result in results {
        lines.push(format!("- {}: {}", result.tool_name, result.result_value()));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use dispatch_core::{
        ChatMessage, ServiceCategory, ToolCallRequest, ToolDefinition, WorkflowState,
    };
    use serde_json::{json, Value};

    use super::ServiceAgent;
    use crate::llm::{InferenceError, InferenceResult, LlmGateway, OfflineGateway};
    use crate::tools::{Tool, ToolError, ToolRegistry};

    struct CannedPaymentsTool {
        definition: ToolDefinition,
    }

    impl CannedPaymentsTool {
        fn new() -> Self {
            Self {
                definition: ToolDefinition::new("list_payments", "List payments with pagination"),
            }
        }
    }

    #[async_trait]
    impl Tool for CannedPaymentsTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, _arguments: &Value) -> Result<Value, ToolError> {
            Ok(json!({"payments": [{"payment_id": "P-1"}], "total": 1}))
        }
    }

    /// Returns a scripted sequence of results, one per infer call.
    struct ScriptedGateway {
        script: Mutex<Vec<Result<InferenceResult, InferenceError>>>,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<InferenceResult, InferenceError>>) -> Self {
            Self { script: Mutex::new(script) }
        }
    }

    #[async_trait]
    impl LlmGateway for ScriptedGateway {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn infer(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<InferenceResult, InferenceError> {
            let mut script = self.script.lock().expect("script lock");
            assert!(!script.is_empty(), "gateway called more often than scripted");
            script.remove(0)
        }
    }

    fn registry_with_payments() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(CannedPaymentsTool::new()).expect("register");
        Arc::new(registry)
    }

    fn inquiry_agent(gateway: Arc<dyn LlmGateway>) -> ServiceAgent {
        ServiceAgent::new(
            ServiceCategory::Inquiry,
            "You answer payment questions.",
            &["list_payments"],
            gateway,
            registry_with_payments(),
        )
    }

    #[tokio::test]
    async fn tool_query_completes_through_both_phases() {
        let agent = inquiry_agent(Arc::new(OfflineGateway::new()));
        let state = agent.run(WorkflowState::new("list payments")).await;

        assert!(state.succeeded);
        assert_eq!(state.requested_tool_calls.len(), 1);
        assert_eq!(state.tool_results.len(), 1);
        assert!(state.tool_results[0].is_success());
        assert!(state.response_text.contains("P-1"));
    }

    #[tokio::test]
    async fn direct_answer_skips_tool_execution() {
        let agent = ServiceAgent::general(
            Arc::new(OfflineGateway::new()),
            Arc::new(ToolRegistry::new()),
        );
        let state = agent.run(WorkflowState::new("what is the weather")).await;

        assert!(state.succeeded);
        assert!(state.requested_tool_calls.is_empty());
        assert!(state.tool_results.is_empty());
        assert!(!state.response_text.is_empty());
    }

    #[tokio::test]
    async fn system_prompt_leads_the_rebuilt_log() {
        let agent = inquiry_agent(Arc::new(OfflineGateway::new()));
        let state = WorkflowState::new("list payments")
            .with_history(vec![ChatMessage::user("earlier question")]);
        let state = agent.run(state).await;

        assert_eq!(state.message_log[0].content, "You answer payment questions.");
        assert_eq!(state.message_log[1].content, "earlier question");
        assert_eq!(state.message_log[2].content, "list payments");
    }

    #[tokio::test]
    async fn resolve_phase_tool_request_falls_back_to_rendered_results() {
        let request = ToolCallRequest::new("list_payments", json!({}));
        let gateway = ScriptedGateway::new(vec![
            Ok(InferenceResult::ToolRequest(vec![request.clone()])),
            Ok(InferenceResult::ToolRequest(vec![request])),
        ]);
        let agent = inquiry_agent(Arc::new(gateway));
        let state = agent.run(WorkflowState::new("list payments")).await;

        // Terminates after exactly two round-trips and still succeeds.
        assert!(state.succeeded);
        assert!(state.response_text.contains("list_payments"));
        assert_eq!(state.tool_results.len(), 1);
    }

    #[tokio::test]
    async fn empty_answer_never_terminates_as_a_blank_success() {
        let gateway = ScriptedGateway::new(vec![Ok(InferenceResult::Answer(String::new()))]);
        let agent = inquiry_agent(Arc::new(gateway));
        let state = agent.run(WorkflowState::new("list payments")).await;

        assert!(!state.succeeded);
        assert!(state.error.is_some());
        assert!(!state.response_text.is_empty());
    }

    #[tokio::test]
    async fn empty_resolve_answer_falls_back_to_rendered_results() {
        let request = ToolCallRequest::new("list_payments", json!({}));
        let gateway = ScriptedGateway::new(vec![
            Ok(InferenceResult::ToolRequest(vec![request])),
            Ok(InferenceResult::Answer("   ".to_string())),
        ]);
        let agent = inquiry_agent(Arc::new(gateway));
        let state = agent.run(WorkflowState::new("list payments")).await;

        assert!(state.succeeded);
        assert!(!state.response_text.is_empty());
        assert!(state.response_text.contains("list_payments"));
    }

    #[tokio::test]
    async fn propose_phase_failure_marks_the_state_failed() {
        let gateway =
            ScriptedGateway::new(vec![Err(InferenceError::Transport("connection refused".into()))]);
        let agent = inquiry_agent(Arc::new(gateway));
        let state = agent.run(WorkflowState::new("list payments")).await;

        assert!(!state.succeeded);
        assert!(state.error.as_deref().unwrap_or_default().contains("connection refused"));
        assert!(!state.response_text.is_empty());
    }

    #[tokio::test]
    async fn resolve_phase_failure_keeps_tool_results() {
        let request = ToolCallRequest::new("list_payments", json!({}));
        let gateway = ScriptedGateway::new(vec![
            Ok(InferenceResult::ToolRequest(vec![request])),
            Err(InferenceError::Provider { status: 500, detail: "overloaded".into() }),
        ]);
        let agent = inquiry_agent(Arc::new(gateway));
        let state = agent.run(WorkflowState::new("list payments")).await;

        assert!(!state.succeeded);
        assert_eq!(state.tool_results.len(), 1);
        assert!(state.tool_results[0].is_success());
    }
}
