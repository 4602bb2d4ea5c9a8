//! Document-management tool catalog.

use dispatch_core::{ToolDefinition, ToolParameter};

use super::{HttpTool, RouteSpec, ServiceClient, ToolError, ToolRegistry};

/// Names bound to the document agent, in advertisement order.
pub const TOOL_NAMES: &[&str] = &[
    "list_documents",
    "get_document",
    "get_document_preview",
    "get_document_versions",
    "upload_document",
];

pub fn register_all(registry: &mut ToolRegistry, client: &ServiceClient) -> Result<(), ToolError> {
    for (definition, route) in catalog() {
        registry.register(HttpTool::new(definition, client.clone(), route))?;
    }
    Ok(())
}

fn catalog() -> Vec<(ToolDefinition, RouteSpec)> {
    vec![
        (
            ToolDefinition::new("list_documents", "List documents, optionally filtered by type")
                .with_parameter(ToolParameter::new("doc_type", "Document type filter", false))
                .with_parameter(
                    ToolParameter::new("limit", "Maximum number of results", false)
                        .with_type("integer")
                        .with_default(10),
                ),
            RouteSpec::Get { path: "/api/v1/documents/", query: &["doc_type", "limit"] },
        ),
        (
            ToolDefinition::new("get_document", "Fetch document metadata by id")
                .with_parameter(doc_id_parameter()),
            RouteSpec::Get { path: "/api/v1/documents/{doc_id}", query: &[] },
        ),
        (
            ToolDefinition::new("get_document_preview", "Fetch a content preview of a document")
                .with_parameter(doc_id_parameter()),
            RouteSpec::Get { path: "/api/v1/documents/{doc_id}/preview", query: &[] },
        ),
        (
            ToolDefinition::new("get_document_versions", "List the version history of a document")
                .with_parameter(doc_id_parameter()),
            RouteSpec::Get { path: "/api/v1/documents/{doc_id}/versions", query: &[] },
        ),
        (
            ToolDefinition::new("upload_document", "Upload a new document")
                .with_parameter(ToolParameter::new("filename", "File name", true))
                .with_parameter(ToolParameter::new("doc_type", "Document type", true))
                .with_parameter(ToolParameter::new("content", "Document content", false)),
            RouteSpec::Post { path: "/api/v1/documents/upload" },
        ),
    ]
}

fn doc_id_parameter() -> ToolParameter {
    ToolParameter::new("doc_id", "Document identifier", true)
}

#[cfg(test)]
mod tests {
    use super::{catalog, register_all, ServiceClient, ToolRegistry, TOOL_NAMES};

    #[test]
    fn catalog_matches_the_advertised_names() {
        let entries = catalog();
        let names: Vec<&str> = entries.iter().map(|(d, _)| d.name.as_str()).collect();
        assert_eq!(names.as_slice(), TOOL_NAMES);
    }

    #[test]
    fn all_tools_register_without_collisions() {
        let client = ServiceClient::new(reqwest::Client::new(), "http://localhost:8000", 5);
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, &client).expect("register");
        assert_eq!(registry.len(), TOOL_NAMES.len());
    }
}
