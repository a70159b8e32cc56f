/// WebSocket upgrade endpoint
///
/// `GET /ws?client_id=<id>` upgrades and hands the socket to the hub. Without
/// a `client_id` a random one is assigned; it is echoed in the
/// `connection_ack`.
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{header, HeaderMap},
    response::Response,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    arguments::is_debug_webserver_enabled,
    logger::{self, LogTag},
    webserver::{state::AppState, ws::serve_socket},
};

#[derive(Debug, Deserialize, Default)]
pub struct WsConnectQuery {
    pub client_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsConnectQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let client_id = resolve_client_id(query.client_id);
    let metadata = connection_metadata(&headers);

    if is_debug_webserver_enabled() {
        logger::debug(
            LogTag::Webserver,
            &format!("WebSocket upgrade requested by {} ({:?})", client_id, metadata.get("user_agent")),
        );
    }

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| serve_socket(socket, hub, client_id, metadata))
}

fn resolve_client_id(requested: Option<String>) -> String {
    requested
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn connection_metadata(headers: &HeaderMap) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();
    if let Some(agent) = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
    {
        metadata.insert("user_agent".to_string(), Value::String(agent.to_string()));
    }
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        metadata.insert("origin".to_string(), Value::String(origin.to_string()));
    }
    metadata.insert(
        "connected_via".to_string(),
        Value::String("websocket".to_string()),
    );
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_id_defaults_to_uuid() {
        assert_eq!(resolve_client_id(Some(" dash-1 ".to_string())), "dash-1");

        let generated = resolve_client_id(Some("   ".to_string()));
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
        assert!(uuid::Uuid::parse_str(&resolve_client_id(None)).is_ok());
    }

    #[test]
    fn test_metadata_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("dash/1.0"));

        let metadata = connection_metadata(&headers);
        assert_eq!(metadata["user_agent"], "dash/1.0");
        assert!(!metadata.contains_key("origin"));
        assert_eq!(metadata["connected_via"], "websocket");
    }
}
