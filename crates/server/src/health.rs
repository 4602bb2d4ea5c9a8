//! Aggregated health endpoint.
//!
//! Probes each downstream data service through the shared client. The LLM
//! gateway proved its configuration at bootstrap, so it is reported by
//! provider name rather than probed per request.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use dispatch_core::config::ServicesConfig;
use serde::Serialize;
use tracing::warn;

#[derive(Clone)]
pub struct HealthState {
    http: reqwest::Client,
    services: ServicesConfig,
    llm_provider: &'static str,
}

impl HealthState {
    pub fn new(http: reqwest::Client, services: ServicesConfig, llm_provider: &'static str) -> Self {
        Self { http, services, llm_provider }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: BTreeMap<String, String>,
    pub timestamp: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let timeout = Duration::from_secs(state.services.timeout_secs);
    let probes = [
        ("payment_service", probe_url(&state.services.payment_api_url, "/api/health")),
        ("infrastructure_service", probe_url(&state.services.infrastructure_api_url, "/health")),
        ("document_service", probe_url(&state.services.document_api_url, "/health")),
    ];

    let mut services = BTreeMap::new();
    let mut reachable = 0usize;
    for (name, url) in probes {
        let healthy = probe(&state.http, &url, timeout).await;
        if healthy {
            reachable += 1;
        }
        services.insert(name.to_string(), if healthy { "healthy" } else { "unreachable" }.to_string());
    }
    services.insert("llm".to_string(), format!("configured ({})", state.llm_provider));

    let status = match reachable {
        3 => "healthy",
        0 => "unhealthy",
        _ => "degraded",
    };
    let status_code =
        if status == "unhealthy" { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };

    let payload =
        HealthResponse { status, services, timestamp: Utc::now().to_rfc3339() };
    (status_code, Json(payload))
}

fn probe_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

async fn probe(http: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    match http.get(url).timeout(timeout).send().await {
        Ok(response) if response.status().is_success() => true,
        Ok(response) => {
            warn!(event_name = "health_probe_failed", url, status = response.status().as_u16());
            false
        }
        Err(error) => {
            warn!(event_name = "health_probe_failed", url, error = %error);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::Json;
    use dispatch_core::config::ServicesConfig;

    use super::{health, probe_url, HealthState};

    #[test]
    fn probe_urls_join_without_double_slashes() {
        assert_eq!(probe_url("http://localhost:9000/", "/api/health"), "http://localhost:9000/api/health");
        assert_eq!(probe_url("http://localhost:8000", "/health"), "http://localhost:8000/health");
    }

    #[tokio::test]
    async fn unreachable_services_degrade_to_unhealthy() {
        // Port 1 on loopback refuses connections immediately.
        let services = ServicesConfig {
            payment_api_url: "http://127.0.0.1:1".to_string(),
            infrastructure_api_url: "http://127.0.0.1:1".to_string(),
            document_api_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
        };
        let state = HealthState::new(reqwest::Client::new(), services, "offline");

        let (status, Json(payload)) = health(State(state)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "unhealthy");
        assert_eq!(payload.services["payment_service"], "unreachable");
        assert_eq!(payload.services["llm"], "configured (offline)");
        assert!(!payload.timestamp.is_empty());
    }
}
