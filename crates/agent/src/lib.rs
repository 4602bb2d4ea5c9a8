//! Agent runtime - query routing, two-phase tool calling, and orchestration
//!
//! This crate is the "brain" of the dispatch system:
//! - Routes an incoming query to a service category (`dispatch_core::classify`)
//! - Runs the matching agent through a two-phase tool-calling protocol
//! - Executes requested tool calls against the external mock data services
//! - Shapes the terminal workflow state into a response envelope
//!
//! # Architecture
//!
//! One request flows through a fixed pipeline:
//! 1. **Classification** - deterministic keyword routing (no LLM call)
//! 2. **Dispatch** (`workflow`) - select the agent bound to the category
//! 3. **Phase 1 - Propose** (`agents`) - the LLM answers directly or proposes
//!    tool calls against the agent's bound tool subset
//! 4. **Phase 2 - Resolve** (`tools`, `agents`) - proposed calls execute in
//!    request order, results are fed back, and a second inference pass
//!    produces the final answer
//! 5. **Facade** (`orchestrator`) - deadline, error containment, response
//!    shaping
//!
//! # Key Types
//!
//! - `LlmGateway` - pluggable trait over Anthropic/OpenAI/offline backends
//! - `ToolRegistry` / `ToolExecutor` - named async tools with a scoped
//!   failure boundary per call
//! - `ServiceAgent` - a (system prompt, tool subset) pair per category
//! - `WorkflowEngine` - the per-request state machine
//!
//! # Containment Principle
//!
//! Tool failures become data (`ToolCallResult` errors) and are explained by
//! the LLM in phase 2. LLM failures degrade to a readable error response.
//! Only configuration errors at startup are allowed to be fatal.

pub mod agents;
pub mod llm;
pub mod orchestrator;
pub mod tools;
pub mod workflow;

pub use agents::ServiceAgent;
pub use llm::{build_gateway, GatewayConfigError, InferenceError, InferenceResult, LlmGateway};
pub use orchestrator::{Orchestrator, RequestOutcome, ToolResultView};
pub use tools::{Tool, ToolError, ToolExecutor, ToolRegistry};
pub use workflow::{RoutingError, WorkflowEngine};
