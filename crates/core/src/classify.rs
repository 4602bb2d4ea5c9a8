//! Deterministic keyword routing from query text to a service category.
//!
//! No LLM call and no I/O: classification is a total, synchronous function
//! over the lowercased query. Category precedence is fixed by declaration
//! order (infrastructure, document, inquiry); a query matching none of the
//! keyword sets falls back to the configured default, `general`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    Inquiry,
    General,
    Infrastructure,
    Document,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inquiry => "inquiry",
            Self::General => "general",
            Self::Infrastructure => "infrastructure",
            Self::Document => "document",
        }
    }
}

impl std::fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug)]
struct CategoryRule {
    category: ServiceCategory,
    keywords: &'static [&'static str],
}

/// Ordered keyword matcher. First rule with any substring hit wins.
#[derive(Clone, Debug)]
pub struct ServiceClassifier {
    rules: Vec<CategoryRule>,
    default_category: ServiceCategory,
}

const INFRASTRUCTURE_KEYWORDS: &[&str] = &[
    "architecture",
    "microservices",
    "cloud",
    "deployment",
    "scalable",
    "containerization",
    "kubernetes",
    "docker",
    "infrastructure",
    "system design",
    "distributed",
    "search index",
    "indices",
    "index a document",
];

const DOCUMENT_KEYWORDS: &[&str] = &[
    "documentation",
    "document",
    "design document",
    "template",
    "guide",
    "outline",
    "technical writing",
    "upload",
    "file version",
    "preview",
];

const INQUIRY_KEYWORDS: &[&str] = &[
    "payment",
    "payments",
    "transaction",
    "transactions",
    "iban",
    "settlement",
    "end-to-end",
    "inquiry",
    "inquiries",
    "ticket",
    "support request",
    "refund",
];

impl Default for ServiceClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                CategoryRule {
                    category: ServiceCategory::Infrastructure,
                    keywords: INFRASTRUCTURE_KEYWORDS,
                },
                CategoryRule { category: ServiceCategory::Document, keywords: DOCUMENT_KEYWORDS },
                CategoryRule { category: ServiceCategory::Inquiry, keywords: INQUIRY_KEYWORDS },
            ],
            default_category: ServiceCategory::General,
        }
    }
}

impl ServiceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_category(&self) -> ServiceCategory {
        self.default_category
    }

    /// Total function: always returns a category, never fails.
    pub fn classify(&self, query: &str) -> ServiceCategory {
        let normalized = query.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|keyword| normalized.contains(keyword)))
            .map(|rule| rule.category)
            .unwrap_or(self.default_category)
    }
}
