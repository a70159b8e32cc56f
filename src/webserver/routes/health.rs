/// Health views for the RPC pool and the WebSocket hub
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::webserver::{
    state::AppState,
    utils::{error_response, success_response},
};

// =============================================================================
// RESPONSE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthSummary {
    /// "ok", or "degraded" when any chain has no closed-breaker endpoint
    pub status: &'static str,
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: &'static str,
    pub rpc_closed: bool,
    pub degraded_chains: Vec<String>,
    pub ws_running: bool,
    pub ws_connections: usize,
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_summary))
        .route("/health/rpc", get(rpc_health))
        .route("/health/rpc/:chain", get(rpc_chain_health))
        .route("/health/ws", get(ws_health))
}

/// GET /api/health - One-line overview of both services
async fn health_summary(State(state): State<Arc<AppState>>) -> Response {
    let pool = state.pool.health();
    let stats = state.hub.get_connection_stats().await;

    let degraded_chains: Vec<String> = pool
        .chains
        .iter()
        .filter(|(_, chain)| chain.providers_up == 0)
        .map(|(name, _)| name.clone())
        .collect();

    success_response(HealthSummary {
        status: if degraded_chains.is_empty() && !pool.closed {
            "ok"
        } else {
            "degraded"
        },
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION"),
        rpc_closed: pool.closed,
        degraded_chains,
        ws_running: stats.running,
        ws_connections: stats.total_connections,
    })
}

/// GET /api/health/rpc - Per-chain breaker and latency view
async fn rpc_health(State(state): State<Arc<AppState>>) -> Response {
    success_response(state.pool.health())
}

/// GET /api/health/rpc/:chain
async fn rpc_chain_health(
    State(state): State<Arc<AppState>>,
    Path(chain): Path<String>,
) -> Response {
    let mut health = state.pool.health();
    match health.chains.remove(&chain) {
        Some(health) => success_response(health),
        None => error_response(
            StatusCode::NOT_FOUND,
            "UNKNOWN_CHAIN",
            &format!("Chain '{}' is not configured", chain),
            None,
        ),
    }
}

/// GET /api/health/ws - Hub connection and subscription counts
async fn ws_health(State(state): State<Arc<AppState>>) -> Response {
    success_response(state.hub.get_connection_stats().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebserverConfig;
    use crate::rpc::{RpcMode, RpcPool};
    use crate::webserver::routes::create_router;
    use crate::webserver::ws::{Channel, HealthConfig, MemorySocket, WebSocketHub};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        let pool = Arc::new(RpcPool::new(RpcMode::Pro).unwrap());
        pool.add_chain("ethereum", &["https://eth-a.example.org", "https://eth-b.example.org"]);
        pool.add_chain("solana", &[] as &[&str]);
        let hub = Arc::new(WebSocketHub::new(HealthConfig::default()));
        Arc::new(AppState::new(WebserverConfig::default(), pool, hub))
    }

    async fn get_json(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_rpc_health_counts_sum_to_endpoints() {
        let (status, body) = get_json(state(), "/api/health/rpc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "pro");

        let eth = &body["chains"]["ethereum"];
        let total = eth["providers_up"].as_u64().unwrap()
            + eth["providers_half_open"].as_u64().unwrap()
            + eth["providers_open"].as_u64().unwrap();
        assert_eq!(total, 2);
        assert_eq!(eth["endpoints"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_unknown_chain_is_404() {
        let (status, body) = get_json(state(), "/api/health/rpc/polygon").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UNKNOWN_CHAIN");

        let (status, body) = get_json(state(), "/api/health/rpc/ethereum").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["providers_up"], 2);
    }

    #[tokio::test]
    async fn test_ws_health_reports_hub_stats() {
        let state = state();
        let socket = MemorySocket::new();
        assert!(state.hub.connect_client("c1", socket, None).await);
        state.hub.subscribe_to_channel("c1", Channel::Discovery).await;

        let (status, body) = get_json(state, "/api/health/ws").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_connections"], 1);
        assert_eq!(body["healthy_connections"], 1);
        assert_eq!(body["channel_subscribers"]["discovery"], 1);
        assert_eq!(body["running"], false);
    }

    #[tokio::test]
    async fn test_summary_flags_chain_without_endpoints() {
        let (status, body) = get_json(state(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["degraded_chains"], serde_json::json!(["solana"]));
        assert_eq!(body["rpc_closed"], false);
    }
}
