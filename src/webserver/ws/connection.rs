/// Client connection records and socket adapters
///
/// The hub never touches a transport directly. Each connection carries an
/// `Arc<dyn ClientSocket>`; the axum adapter wraps the write half of a real
/// WebSocket, while [`MemorySocket`] records frames in memory for tests and
/// debug tools.
use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use chrono::{DateTime, Utc};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

use crate::errors::SocketError;
use crate::logger::{self, LogTag};

use super::hub::WebSocketHub;
use super::message::Channel;
use super::metrics::ConnectionMetrics;

// ============================================================================
// SOCKET ABSTRACTION
// ============================================================================

#[async_trait]
pub trait ClientSocket: Send + Sync {
    async fn send_text(&self, text: String) -> Result<(), SocketError>;

    /// Graceful close with a human-readable reason
    async fn close(&self, reason: &str) -> Result<(), SocketError>;
}

// ============================================================================
// CONNECTION RECORD
// ============================================================================

pub struct ClientConnection {
    pub client_id: String,
    pub socket: Arc<dyn ClientSocket>,
    pub subscribed_channels: HashSet<Channel>,
    pub connected_at: DateTime<Utc>,
    /// Refreshed on every inbound frame
    pub last_heartbeat: Instant,
    pub metadata: HashMap<String, Value>,
    pub metrics: Arc<ConnectionMetrics>,
}

impl ClientConnection {
    pub fn new(
        client_id: &str,
        socket: Arc<dyn ClientSocket>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            socket,
            subscribed_channels: HashSet::new(),
            connected_at: Utc::now(),
            last_heartbeat: Instant::now(),
            metadata,
            metrics: Arc::new(ConnectionMetrics::default()),
        }
    }

    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
        self.metrics.inc_received();
    }

    pub fn owns_socket(&self, socket: &Arc<dyn ClientSocket>) -> bool {
        Arc::ptr_eq(&self.socket, socket)
    }
}

// ============================================================================
// IN-MEMORY SOCKET
// ============================================================================

/// Recording socket; can be switched to fail or hang on send
#[derive(Default)]
pub struct MemorySocket {
    sent: Mutex<Vec<String>>,
    close_reason: Mutex<Option<String>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    closed: AtomicBool,
}

impl MemorySocket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every subsequent send returns a transport error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every subsequent send never completes
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Sent frames parsed as JSON; unparseable frames are skipped
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn close_reason(&self) -> Option<String> {
        self.close_reason.lock().clone()
    }
}

#[async_trait]
impl ClientSocket for MemorySocket {
    async fn send_text(&self, text: String) -> Result<(), SocketError> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(SocketError::Closed);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SocketError::Transport("connection reset by peer".to_string()));
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self, reason: &str) -> Result<(), SocketError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(SocketError::Closed);
        }
        *self.close_reason.lock() = Some(reason.to_string());
        Ok(())
    }
}

// ============================================================================
// AXUM SOCKET
// ============================================================================

/// Write half of an upgraded axum WebSocket
pub struct AxumSocket {
    sink: tokio::sync::Mutex<SplitSink<WebSocket, Message>>,
}

impl AxumSocket {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: tokio::sync::Mutex::new(sink),
        }
    }
}

#[async_trait]
impl ClientSocket for AxumSocket {
    async fn send_text(&self, text: String) -> Result<(), SocketError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| SocketError::Transport(e.to_string()))
    }

    async fn close(&self, reason: &str) -> Result<(), SocketError> {
        let mut sink = self.sink.lock().await;
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: reason.to_string().into(),
        };
        sink.send(Message::Close(Some(frame)))
            .await
            .map_err(|e| SocketError::Transport(e.to_string()))?;
        sink.close()
            .await
            .map_err(|e| SocketError::Transport(e.to_string()))
    }
}

// ============================================================================
// CONNECTION DRIVER
// ============================================================================

/// Drive an upgraded socket until the peer leaves or the hub drops it
///
/// Registers with the hub, feeds every inbound text frame to
/// [`WebSocketHub::handle_client_message`] and unregisters on exit. If the
/// client id was taken over by a newer connection, only this socket's own
/// registration is removed.
pub async fn serve_socket(
    socket: WebSocket,
    hub: Arc<WebSocketHub>,
    client_id: String,
    metadata: HashMap<String, Value>,
) {
    let (sink, mut stream) = socket.split();
    let handle: Arc<dyn ClientSocket> = Arc::new(AxumSocket::new(sink));

    if !hub
        .connect_client(&client_id, handle.clone(), Some(metadata))
        .await
    {
        logger::warning(
            LogTag::Webserver,
            &format!("Rejected websocket for client {}", client_id),
        );
        return;
    }

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => hub.handle_client_message(&client_id, &text).await,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                hub.touch_client(&client_id).await;
            }
            Ok(Message::Binary(_)) => {
                logger::debug(
                    LogTag::WsHub,
                    &format!("Ignoring binary frame from {}", client_id),
                );
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                logger::debug(
                    LogTag::WsHub,
                    &format!("Socket error for {}: {}", client_id, e),
                );
                break;
            }
        }

        if !hub.owns_connection(&client_id, &handle).await {
            break;
        }
    }

    hub.release_socket(&client_id, &handle, "Client disconnected")
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_socket_records_and_fails() {
        let socket = MemorySocket::new();
        socket.send_text("one".to_string()).await.unwrap();

        socket.set_failing(true);
        assert!(matches!(
            socket.send_text("two".to_string()).await,
            Err(SocketError::Transport(_))
        ));
        assert_eq!(socket.sent(), vec!["one".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_socket_close_once() {
        let socket = MemorySocket::new();
        socket.close("bye").await.unwrap();
        assert!(socket.is_closed());
        assert_eq!(socket.close_reason().as_deref(), Some("bye"));

        assert_eq!(socket.close("again").await, Err(SocketError::Closed));
        assert_eq!(
            socket.send_text("late".to_string()).await,
            Err(SocketError::Closed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_refreshes_heartbeat() {
        let socket: Arc<dyn ClientSocket> = MemorySocket::new();
        let mut conn = ClientConnection::new("c1", socket.clone(), HashMap::new());
        let first = conn.last_heartbeat;

        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        conn.touch();

        assert!(conn.last_heartbeat > first);
        assert!(conn.owns_socket(&socket));
        assert_eq!(conn.metrics.snapshot().messages_received, 1);
    }
}
