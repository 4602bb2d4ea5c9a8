use serde::{Deserialize, Serialize};

use crate::classify::ServiceCategory;
use crate::domain::message::ChatMessage;
use crate::domain::tool::{ToolCallRequest, ToolCallResult};

/// Mutable per-request workflow record, owned exclusively by one engine
/// invocation and destroyed when it returns.
///
/// Invariants held by the engine and agents:
/// - `service_type` is assigned before any agent executes
/// - `tool_results.len() == requested_tool_calls.len()` at termination
/// - exactly one of `{response_text set, succeeded}` or `{error set, !succeeded}`
///   holds at termination
/// - `message_log` is append-only, ordered by protocol phase
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub service_type: Option<ServiceCategory>,
    pub message_log: Vec<ChatMessage>,
    pub requested_tool_calls: Vec<ToolCallRequest>,
    pub tool_results: Vec<ToolCallResult>,
    pub response_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub succeeded: bool,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_id: None,
            service_type: None,
            message_log: Vec::new(),
            requested_tool_calls: Vec::new(),
            tool_results: Vec::new(),
            response_text: String::new(),
            error: None,
            succeeded: false,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Thread prior conversation turns into the log. History is per-request
    /// context only; nothing is persisted across invocations.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.message_log = history;
        self
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.message_log.push(message);
    }

    /// Terminal success: non-empty answer, success flag set exactly once.
    pub fn complete(&mut self, response_text: impl Into<String>) {
        self.response_text = response_text.into();
        self.error = None;
        self.succeeded = true;
    }

    /// Terminal failure: the error is recorded and a human-readable response
    /// is still produced so the API boundary never surfaces a bare failure.
    pub fn fail(&mut self, error: impl Into<String>, response_text: impl Into<String>) {
        self.error = Some(error.into());
        self.response_text = response_text.into();
        self.succeeded = false;
    }

    pub fn is_terminal(&self) -> bool {
        self.succeeded || self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::message::ChatMessage;

    use super::WorkflowState;

    #[test]
    fn new_state_is_not_terminal() {
        let state = WorkflowState::new("list payments");
        assert!(!state.is_terminal());
        assert!(state.service_type.is_none());
        assert!(state.message_log.is_empty());
    }

    #[test]
    fn complete_sets_success_exclusively() {
        let mut state = WorkflowState::new("list payments");
        state.fail("transient", "try again");
        state.complete("here are your payments");

        assert!(state.succeeded);
        assert!(state.error.is_none());
        assert_eq!(state.response_text, "here are your payments");
    }

    #[test]
    fn fail_keeps_a_readable_response() {
        let mut state = WorkflowState::new("list payments");
        state.fail("provider unreachable", "I could not reach the language model.");

        assert!(!state.succeeded);
        assert_eq!(state.error.as_deref(), Some("provider unreachable"));
        assert!(!state.response_text.is_empty());
        assert!(state.is_terminal());
    }

    #[test]
    fn history_precedes_appended_messages() {
        let mut state = WorkflowState::new("and the second one?")
            .with_history(vec![ChatMessage::user("list payments")]);
        state.push_message(ChatMessage::user("and the second one?"));

        assert_eq!(state.message_log.len(), 2);
        assert_eq!(state.message_log[0].content, "list payments");
    }
}
