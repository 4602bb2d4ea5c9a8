pub mod classify;
pub mod config;
pub mod domain;

pub use classify::{ServiceCategory, ServiceClassifier};
pub use domain::message::{ChatMessage, ChatRole};
pub use domain::state::WorkflowState;
pub use domain::tool::{ToolCallRequest, ToolCallResult, ToolDefinition, ToolParameter};
