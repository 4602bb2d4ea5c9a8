//! Payment-inquiry tool catalog.
//!
//! Read-mostly views over the payment data service: listings, searches,
//! single-record lookups, and aggregate stats.

use dispatch_core::{ToolDefinition, ToolParameter};

use super::{HttpTool, RouteSpec, ServiceClient, ToolError, ToolRegistry};

/// Names bound to the inquiry agent, in advertisement order.
pub const TOOL_NAMES: &[&str] = &[
    "list_payments",
    "search_payments",
    "get_payment",
    "get_payment_with_transactions",
    "get_payment_by_message_id",
    "list_transactions",
    "get_transaction",
    "search_transactions",
    "get_transactions_by_payment",
    "get_transaction_by_end_to_end_id",
    "get_inquiry_stats",
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
            ToolDefinition::new("list_payments", "List payments with pagination")
                .with_parameter(limit_parameter())
                .with_parameter(offset_parameter()),
            RouteSpec::Get { path: "/api/payments", query: &["limit", "offset"] },
        ),
        (
            ToolDefinition::new(
                "search_payments",
                "Search payments by id, IBAN, status, channel, or product",
            )
            .with_parameter(ToolParameter::new("payment_id", "Payment identifier", false))
            .with_parameter(ToolParameter::new("debtor_iban", "Debtor account IBAN", false))
            .with_parameter(ToolParameter::new("creditor_iban", "Creditor account IBAN", false))
            .with_parameter(ToolParameter::new("status", "Payment status filter", false))
            .with_parameter(ToolParameter::new("channel", "Origination channel filter", false))
            .with_parameter(ToolParameter::new("product", "Payment product filter", false))
            .with_parameter(limit_parameter()),
            RouteSpec::Post { path: "/api/payments/search" },
        ),
        (
            ToolDefinition::new("get_payment", "Fetch a single payment by id")
                .with_parameter(payment_id_parameter()),
            RouteSpec::Get { path: "/api/payments/{payment_id}", query: &[] },
        ),
        (
            ToolDefinition::new(
                "get_payment_with_transactions",
                "Fetch a payment together with its transactions",
            )
            .with_parameter(payment_id_parameter()),
            RouteSpec::Get { path: "/api/payments/{payment_id}/full", query: &[] },
        ),
        (
            ToolDefinition::new(
                "get_payment_by_message_id",
                "Look up a payment by its message id",
            )
            .with_parameter(ToolParameter::new("message_id", "Payment message identifier", true)),
            RouteSpec::Get { path: "/api/payments/by-message/{message_id}", query: &[] },
        ),
        (
            ToolDefinition::new("list_transactions", "List transactions with pagination")
                .with_parameter(limit_parameter())
                .with_parameter(offset_parameter()),
            RouteSpec::Get { path: "/api/transactions", query: &["limit", "offset"] },
        ),
        (
            ToolDefinition::new("get_transaction", "Fetch a single transaction by id")
                .with_parameter(ToolParameter::new(
                    "transaction_id",
                    "Transaction identifier",
                    true,
                )),
            RouteSpec::Get { path: "/api/transactions/{transaction_id}", query: &[] },
        ),
        (
            ToolDefinition::new(
                "search_transactions",
                "Search transactions by id, payment, status, or type",
            )
            .with_parameter(ToolParameter::new("transaction_id", "Transaction identifier", false))
            .with_parameter(ToolParameter::new("payment_id", "Parent payment identifier", false))
            .with_parameter(ToolParameter::new("status", "Transaction status filter", false))
            .with_parameter(ToolParameter::new("transaction_type", "Transaction type filter", false))
            .with_parameter(limit_parameter()),
            RouteSpec::Post { path: "/api/transactions/search" },
        ),
        (
            ToolDefinition::new(
                "get_transactions_by_payment",
                "List all transactions belonging to a payment",
            )
            .with_parameter(payment_id_parameter()),
            RouteSpec::Get { path: "/api/transactions/by-payment/{payment_id}", query: &[] },
        ),
        (
            ToolDefinition::new(
                "get_transaction_by_end_to_end_id",
                "Look up a transaction by its end-to-end id",
            )
            .with_parameter(ToolParameter::new(
                "end_to_end_id",
                "End-to-end transaction identifier",
                true,
            )),
            RouteSpec::Get { path: "/api/transactions/by-e2e/{end_to_end_id}", query: &[] },
        ),
        (
            ToolDefinition::new("get_inquiry_stats", "Aggregate payment inquiry statistics"),
            RouteSpec::Get { path: "/api/stats", query: &[] },
        ),
    ]
}

fn limit_parameter() -> ToolParameter {
    ToolParameter::new("limit", "Maximum number of results", false)
        .with_type("integer")
        .with_default(10)
}

fn offset_parameter() -> ToolParameter {
    ToolParameter::new("offset", "Number of results to skip", false)
        .with_type("integer")
        .with_default(0)
}

fn payment_id_parameter() -> ToolParameter {
    ToolParameter::new("payment_id", "Payment identifier", true)
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
        let client = ServiceClient::new(reqwest::Client::new(), "http://localhost:9000", 5);
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, &client).expect("register");
        assert_eq!(registry.len(), TOOL_NAMES.len());
        assert_eq!(registry.definitions_for(TOOL_NAMES).len(), TOOL_NAMES.len());
    }

    #[test]
    fn id_lookups_cover_message_and_end_to_end_ids() {
        let catalog = catalog();
        let by_message = catalog
            .iter()
            .find(|(definition, _)| definition.name == "get_payment_by_message_id")
            .expect("message-id lookup");
        assert!(by_message.0.parameters.iter().any(|p| p.name == "message_id" && p.required));
        match &by_message.1 {
            super::RouteSpec::Get { path, .. } => {
                assert_eq!(*path, "/api/payments/by-message/{message_id}")
            }
            other => panic!("expected GET route, got {other:?}"),
        }

        let by_e2e = catalog
            .iter()
            .find(|(definition, _)| definition.name == "get_transaction_by_end_to_end_id")
            .expect("end-to-end lookup");
        assert!(by_e2e.0.parameters.iter().any(|p| p.name == "end_to_end_id" && p.required));
        match &by_e2e.1 {
            super::RouteSpec::Get { path, .. } => {
                assert_eq!(*path, "/api/transactions/by-e2e/{end_to_end_id}")
            }
            other => panic!("expected GET route, got {other:?}"),
        }
    }

    #[test]
    fn list_payments_defaults_to_first_page() {
        let definition = &catalog()[0].0;
        let limit = definition
            .parameters
            .iter()
            .find(|p| p.name == "limit")
            .expect("limit parameter");
        assert_eq!(limit.default, Some(serde_json::json!(10)));
    }
}
