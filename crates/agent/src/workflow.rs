//! Per-request workflow engine.
//!
//! The engine is stateless across invocations: every call builds a fresh
//! [`WorkflowState`], walks it through classification and dispatch, and
//! returns the terminal state. There is no queue and no persistence.

use std::collections::HashMap;

use dispatch_core::{ChatMessage, ServiceCategory, ServiceClassifier, WorkflowState};
use thiserror::Error;
use tracing::info;

use crate::agents::ServiceAgent;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no agent is registered for category `{0}`")]
    NoAgent(ServiceCategory),
}

pub struct WorkflowEngine {
    classifier: ServiceClassifier,
    agents: HashMap<ServiceCategory, ServiceAgent>,
}

impl WorkflowEngine {
    pub fn new(classifier: ServiceClassifier, agents: Vec<ServiceAgent>) -> Self {
        let agents = agents.into_iter().map(|agent| (agent.category(), agent)).collect();
        Self { classifier, agents }
    }

    /// Run one query to a terminal state. `history` carries prior chat turns
    /// as per-request context only.
    pub async fn invoke(
        &self,
        query: &str,
        user_id: Option<String>,
        history: Vec<ChatMessage>,
    ) -> Result<WorkflowState, RoutingError> {
        let mut state = WorkflowState::new(query).with_user_id(user_id).with_history(history);
        info!(event_name = "workflow_start", query_len = query.len());

        let category = self.classifier.classify(query);
        state.service_type = Some(category);
        info!(event_name = "workflow_classified", category = %category);

        let agent = self.agents.get(&category).ok_or(RoutingError::NoAgent(category))?;
        info!(event_name = "workflow_dispatched", category = %category);

        let state = agent.run(state).await;
        info!(
            event_name = "workflow_done",
            category = %category,
            succeeded = state.succeeded,
            tool_calls = state.tool_results.len(),
        );
        Ok(state)
    }
}
