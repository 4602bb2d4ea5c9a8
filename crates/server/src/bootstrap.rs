//! Dependency wiring.
//!
//! Everything long-lived is constructed here, once, from loaded config:
//! shared HTTP client, LLM gateway, tool registry with its service clients,
//! the four agents, the engine, and the orchestrator facade. Misconfiguration
//! fails fast here; nothing below this layer constructs its own collaborators.

use std::sync::Arc;
use std::time::Duration;

use dispatch_agent::tools::{documents, infrastructure, payments, ServiceClient};
use dispatch_agent::{
    build_gateway, GatewayConfigError, Orchestrator, ServiceAgent, ToolError, ToolRegistry,
    WorkflowEngine,
};
use dispatch_core::config::{AppConfig, ConfigError};
use dispatch_core::ServiceClassifier;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub http: reqwest::Client,
    pub llm_provider: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayConfigError),
    #[error("tool registration failed: {0}")]
    Tools(#[from] ToolError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_start", provider = %config.llm.provider);

    let http = reqwest::Client::new();
    let gateway = build_gateway(&config.llm, &http)?;
    let llm_provider = gateway.provider_name();
    info!(event_name = "bootstrap_gateway_ready", provider = llm_provider);

    let timeout = config.services.timeout_secs;
    let mut registry = ToolRegistry::new();
    payments::register_all(
        &mut registry,
        &ServiceClient::new(http.clone(), &config.services.payment_api_url, timeout),
    )?;
    infrastructure::register_all(
        &mut registry,
        &ServiceClient::new(http.clone(), &config.services.infrastructure_api_url, timeout),
    )?;
    documents::register_all(
        &mut registry,
        &ServiceClient::new(http.clone(), &config.services.document_api_url, timeout),
    )?;
    info!(event_name = "bootstrap_tools_registered", tools = registry.len());

    let registry = Arc::new(registry);
    let agents = vec![
        ServiceAgent::inquiry(gateway.clone(), registry.clone()),
        ServiceAgent::general(gateway.clone(), registry.clone()),
        ServiceAgent::infrastructure(gateway.clone(), registry.clone()),
        ServiceAgent::document(gateway, registry),
    ];
    let engine = Arc::new(WorkflowEngine::new(ServiceClassifier::default(), agents));
    let orchestrator = Arc::new(Orchestrator::new(
        engine,
        Duration::from_secs(config.server.request_timeout_secs),
    ));

    info!(event_name = "bootstrap_complete");
    Ok(Application { config, orchestrator, http, llm_provider })
}
