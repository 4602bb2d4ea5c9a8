//! Search-infrastructure tool catalog.
//!
//! Index management and document search against the infrastructure service.

use dispatch_core::{ToolDefinition, ToolParameter};

use super::{HttpTool, RouteSpec, ServiceClient, ToolError, ToolRegistry};

/// Names bound to the infrastructure agent, in advertisement order.
pub const TOOL_NAMES: &[&str] =
    &["list_indices", "create_index", "get_index", "search_documents", "index_document"];

pub fn register_all(registry: &mut ToolRegistry, client: &ServiceClient) -> Result<(), ToolError> {
    for (definition, route) in catalog() {
        registry.register(HttpTool::new(definition, client.clone(), route))?;
    }
    Ok(())
}

fn catalog() -> Vec<(ToolDefinition, RouteSpec)> {
    vec![
        (
            ToolDefinition::new("list_indices", "List all search indices"),
            RouteSpec::Get { path: "/api/v1/infra/indices", query: &[] },
        ),
        (
            ToolDefinition::new("create_index", "Create a new search index")
                .with_parameter(ToolParameter::new("name", "Index name", true))
                .with_parameter(
                    ToolParameter::new("settings", "Index settings", false).with_type("object"),
                ),
            RouteSpec::Post { path: "/api/v1/infra/indices" },
        ),
        (
            ToolDefinition::new("get_index", "Get details of one search index")
                .with_parameter(index_id_parameter()),
            RouteSpec::Get { path: "/api/v1/infra/indices/{index_id}", query: &[] },
        ),
        (
            ToolDefinition::new("search_documents", "Search documents in an index")
                .with_parameter(index_id_parameter())
                .with_parameter(ToolParameter::new("query", "Search query text", true))
                .with_parameter(
                    ToolParameter::new("limit", "Maximum number of results", false)
                        .with_type("integer")
                        .with_default(10),
                ),
            RouteSpec::Post { path: "/api/v1/infra/indices/{index_id}/search" },
        ),
        (
            ToolDefinition::new("index_document", "Index a document in a search index")
                .with_parameter(index_id_parameter())
                .with_parameter(ToolParameter::new("content", "Document content", true))
                .with_parameter(
                    ToolParameter::new("metadata", "Document metadata", false).with_type("object"),
                ),
            RouteSpec::Post { path: "/api/v1/infra/indices/{index_id}/documents" },
        ),
    ]
}

fn index_id_parameter() -> ToolParameter {
    ToolParameter::new("index_id", "Index identifier", true)
}
