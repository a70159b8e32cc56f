/// Axum webserver implementation
///
/// Binds the configured address and serves until the shutdown notifier fires
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    logger::{self, LogTag},
    webserver::{routes, state::AppState},
};

/// Start the webserver
///
/// Blocks until `shutdown` is notified or the server fails
pub async fn start_server(state: Arc<AppState>, shutdown: Arc<Notify>) -> Result<(), String> {
    let host = state.config.host.clone();
    let port = state.config.port;

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| format!("Invalid bind address {}:{}: {}", host, port, e))?;

    // Create TCP listener
    let listener = TcpListener::bind(&addr).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::AddrInUse => format!(
            "Failed to bind to {}: Address already in use\n\
             \n\
             Another dexsniper instance (or another service) is using port {}.\n\
             Change [webserver] port in the config file or stop the other process.",
            addr, port
        ),
        std::io::ErrorKind::PermissionDenied => format!(
            "Failed to bind to {}: Permission denied\n\
             \n\
             Port {} requires elevated privileges on this system.\n\
             Consider using a port above 1024 or running with appropriate permissions.",
            addr, port
        ),
        _ => format!("Failed to bind to {}: {}", addr, e),
    })?;

    serve(listener, state, shutdown).await
}

/// Serve on an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> Result<(), String> {
    if let Ok(addr) = listener.local_addr() {
        logger::info(
            LogTag::Webserver,
            &format!("Webserver listening on http://{} (hub at ws://{}/ws)", addr, addr),
        );
    }

    let app = build_app(state);

    // Run the server with graceful shutdown
    let shutdown_signal = async move {
        shutdown.notified().await;
        logger::debug(
            LogTag::Webserver,
            "Received shutdown signal, stopping webserver...",
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    logger::info(LogTag::Webserver, "Webserver stopped gracefully");

    Ok(())
}

/// Build the Axum application with all routes and middleware
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::create_router(state).layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WebserverConfig;
    use crate::rpc::{RpcMode, RpcPool};
    use crate::webserver::ws::{Channel, HealthConfig, WebSocketHub};
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn test_serves_health_until_shutdown() {
        let pool = Arc::new(RpcPool::new(RpcMode::Free).unwrap());
        pool.add_chain("base", &["https://base.example.org"]);
        let hub = Arc::new(WebSocketHub::new(HealthConfig::default()));
        let state = Arc::new(AppState::new(WebserverConfig::default(), pool, hub));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(serve(listener, state, shutdown.clone()));

        let body: serde_json::Value = reqwest::get(format!("http://{}/api/health/rpc", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["mode"], "free");
        assert_eq!(body["chains"]["base"]["providers_up"], 1);

        shutdown.notify_one();
        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_websocket_session_end_to_end() {
        let pool = Arc::new(RpcPool::new(RpcMode::Free).unwrap());
        let hub = Arc::new(WebSocketHub::new(HealthConfig::default()));
        let state = Arc::new(AppState::new(WebserverConfig::default(), pool, hub.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(serve(listener, state, shutdown.clone()));

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws?client_id=dash", addr))
            .await
            .unwrap();

        let ack = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            other => panic!("expected text ack, got {:?}", other),
        };
        assert_eq!(ack["type"], "connection_ack");
        assert_eq!(ack["client_id"], "dash");

        // Control frames only refresh liveness; the session must keep going
        ws.send(Message::Ping(vec![1, 2, 3])).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"subscribe","channel":"discovery"}"#.to_string(),
        ))
        .await
        .unwrap();

        let reply = loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => break serde_json::from_str::<serde_json::Value>(&text).unwrap(),
                Message::Pong(_) => continue,
                other => panic!("unexpected frame {:?}", other),
            }
        };
        assert_eq!(reply["type"], "subscription_ack");
        assert_eq!(hub.subscribers(Channel::Discovery).await, vec!["dash".to_string()]);

        ws.close(None).await.unwrap();
        while let Ok(Some(_)) = tokio::time::timeout(Duration::from_secs(2), ws.next()).await {}

        for _ in 0..40 {
            if !hub.is_connected("dash").await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!hub.is_connected("dash").await);
        assert!(hub.subscribers(Channel::Discovery).await.is_empty());

        shutdown.notify_one();
        assert!(server.await.unwrap().is_ok());
    }
}
