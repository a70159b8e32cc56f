/// WebSocket hub - connection registry and channel fan-out
///
/// The hub owns every live [`ClientConnection`] and a parallel map of
/// channel → subscriber ids. Deliveries always iterate a snapshot taken under
/// the read locks; sockets are written with no lock held, each send bounded
/// by the configured send timeout. A failed or hung send disconnects only
/// that client.
///
/// Two background loops run between [`WebSocketHub::start`] and
/// [`WebSocketHub::stop`]: a heartbeat broadcaster on the `all` channel and a
/// sweeper that evicts connections whose last inbound frame is older than the
/// heartbeat timeout.
///
/// Lock order: `connections` before `channel_subscribers`.
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::arguments::is_debug_ws_hub_enabled;
use crate::config::WebSocketHubConfig;
use crate::errors::SocketError;
use crate::logger::{self, LogTag};

use super::connection::{ClientConnection, ClientSocket};
use super::health::HealthConfig;
use super::message::{Channel, MessageType, WebSocketMessage};
use super::metrics::{ConnectionMetrics, HubMetrics, HubMetricsSnapshot};

/// How long `stop()` waits for a loop to notice shutdown before aborting it
const LOOP_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// HUB TYPES
// ============================================================================

/// Point-in-time view used by `/api/health/ws` and the debug tool
#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub total_connections: usize,
    /// Subscriber count for every channel, zero included
    pub channel_subscribers: BTreeMap<String, usize>,
    pub healthy_connections: usize,
    pub running: bool,
    pub metrics: HubMetricsSnapshot,
}

/// Everything needed to write to one client without holding a hub lock
struct DeliveryTarget {
    client_id: String,
    socket: Arc<dyn ClientSocket>,
    metrics: Arc<ConnectionMetrics>,
}

impl DeliveryTarget {
    fn from_connection(conn: &ClientConnection) -> Self {
        Self {
            client_id: conn.client_id.clone(),
            socket: conn.socket.clone(),
            metrics: conn.metrics.clone(),
        }
    }
}

// ============================================================================
// WEBSOCKET HUB
// ============================================================================

pub struct WebSocketHub {
    config: HealthConfig,

    /// client_id → connection record
    connections: RwLock<HashMap<String, ClientConnection>>,

    /// channel → subscribed client ids (back-references only)
    channel_subscribers: RwLock<HashMap<Channel, HashSet<String>>>,

    running: AtomicBool,
    /// `true` once stop was requested; loops watch for the change
    shutdown: watch::Sender<bool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<HubMetrics>,
}

impl WebSocketHub {
    pub fn new(config: HealthConfig) -> Self {
        let channel_subscribers = Channel::ALL_CHANNELS
            .into_iter()
            .map(|channel| (channel, HashSet::new()))
            .collect();

        Self {
            config,
            connections: RwLock::new(HashMap::new()),
            channel_subscribers: RwLock::new(channel_subscribers),
            running: AtomicBool::new(false),
            shutdown: watch::channel(false).0,
            tasks: parking_lot::Mutex::new(Vec::new()),
            metrics: Arc::new(HubMetrics::default()),
        }
    }

    pub fn from_config(config: &WebSocketHubConfig) -> Self {
        Self::new(HealthConfig::from_config(config))
    }

    pub fn health_config(&self) -> HealthConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        self.metrics.clone()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Spawn the heartbeat and cleanup loops; a no-op while already running
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            logger::debug(LogTag::WsHub, "Hub already running");
            return;
        }

        self.shutdown.send_replace(false);

        let heartbeat = tokio::spawn(run_heartbeat_loop(
            Arc::downgrade(self),
            self.shutdown.subscribe(),
            self.config.heartbeat_interval,
        ));
        let cleanup = tokio::spawn(run_cleanup_loop(
            Arc::downgrade(self),
            self.shutdown.subscribe(),
            self.config.cleanup_interval,
        ));
        self.tasks.lock().extend([heartbeat, cleanup]);

        logger::info(
            LogTag::WsHub,
            &format!(
                "Hub started (heartbeat every {}s, cleanup every {}s, timeout {}s)",
                self.config.heartbeat_interval.as_secs(),
                self.config.cleanup_interval.as_secs(),
                self.config.heartbeat_timeout.as_secs()
            ),
        );
    }

    /// Stop both loops and disconnect every remaining client
    pub async fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let abort = handle.abort_handle();
            if timeout(LOOP_SHUTDOWN_GRACE, handle).await.is_err() {
                logger::warning(LogTag::WsHub, "Hub loop did not stop in time, aborting");
                abort.abort();
            }
        }

        let client_ids: Vec<String> = self.connections.read().await.keys().cloned().collect();
        let remaining = client_ids.len();
        for client_id in client_ids {
            self.disconnect_client(&client_id, "Server shutting down").await;
        }

        if was_running {
            logger::info(
                LogTag::WsHub,
                &format!("Hub stopped ({} clients disconnected)", remaining),
            );
        }
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    /// Register a client and send its `connection_ack`
    ///
    /// An existing connection with the same id is replaced and closed. Returns
    /// false, with nothing registered, when the ack cannot be delivered.
    pub async fn connect_client(
        &self,
        client_id: &str,
        socket: Arc<dyn ClientSocket>,
        metadata: Option<HashMap<String, Value>>,
    ) -> bool {
        if client_id.is_empty() {
            logger::warning(LogTag::WsHub, "Rejected connection with empty client id");
            return false;
        }

        let ack = match WebSocketMessage::connection_ack(client_id).to_json() {
            Ok(json) => json,
            Err(e) => {
                logger::error(
                    LogTag::WsHub,
                    &format!("Failed to encode connection ack for {}: {}", client_id, e),
                );
                return false;
            }
        };

        let connection = ClientConnection::new(client_id, socket.clone(), metadata.unwrap_or_default());
        let target = DeliveryTarget::from_connection(&connection);

        let replaced = {
            let mut connections = self.connections.write().await;
            let previous = connections.insert(client_id.to_string(), connection);
            if previous.is_some() {
                let mut subscribers = self.channel_subscribers.write().await;
                for ids in subscribers.values_mut() {
                    ids.remove(client_id);
                }
            }
            previous
        };

        if let Some(old) = replaced {
            logger::info(
                LogTag::WsHub,
                &format!("Client {} reconnected, closing previous socket", client_id),
            );
            self.metrics.connection_closed();
            self.close_socket(client_id, &old.socket, "Replaced by new connection")
                .await;
        }

        if let Err(e) = self.deliver(&target, ack).await {
            logger::warning(
                LogTag::WsHub,
                &format!("Connection ack to {} failed: {}", client_id, e),
            );
            self.remove_connection(client_id, Some(&socket)).await;
            let _ = timeout(self.config.send_timeout, socket.close("Handshake failed")).await;
            return false;
        }

        self.metrics.connection_opened();
        logger::info(
            LogTag::WsHub,
            &format!(
                "Client {} connected ({} total)",
                client_id,
                self.connection_count().await
            ),
        );
        true
    }

    /// Remove a client everywhere and close its socket; unknown ids are a no-op
    pub async fn disconnect_client(&self, client_id: &str, reason: &str) {
        match self.remove_connection(client_id, None).await {
            Some(conn) => self.finish_disconnect(conn, reason).await,
            None => logger::debug(
                LogTag::WsHub,
                &format!("Disconnect for unknown client {} ignored", client_id),
            ),
        }
    }

    /// Disconnect only if `socket` is still the registered one for `client_id`
    ///
    /// Used by socket drivers and failed deliveries so that a stale socket
    /// never tears down a newer connection under the same id.
    pub async fn release_socket(
        &self,
        client_id: &str,
        socket: &Arc<dyn ClientSocket>,
        reason: &str,
    ) -> bool {
        match self.remove_connection(client_id, Some(socket)).await {
            Some(conn) => {
                self.finish_disconnect(conn, reason).await;
                true
            }
            None => false,
        }
    }

    pub async fn owns_connection(&self, client_id: &str, socket: &Arc<dyn ClientSocket>) -> bool {
        self.connections
            .read()
            .await
            .get(client_id)
            .map(|conn| conn.owns_socket(socket))
            .unwrap_or(false)
    }

    /// Refresh `last_heartbeat`; false if the client is not connected
    pub async fn touch_client(&self, client_id: &str) -> bool {
        match self.connections.write().await.get_mut(client_id) {
            Some(conn) => {
                conn.touch();
                true
            }
            None => false,
        }
    }

    pub async fn is_connected(&self, client_id: &str) -> bool {
        self.connections.read().await.contains_key(client_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Subscribe and send a `subscription_ack`; false if the client is unknown
    pub async fn subscribe_to_channel(&self, client_id: &str, channel: Channel) -> bool {
        {
            let mut connections = self.connections.write().await;
            let Some(conn) = connections.get_mut(client_id) else {
                logger::debug(
                    LogTag::WsHub,
                    &format!("Subscribe from unknown client {} ignored", client_id),
                );
                return false;
            };
            conn.subscribed_channels.insert(channel);

            let mut subscribers = self.channel_subscribers.write().await;
            subscribers
                .entry(channel)
                .or_default()
                .insert(client_id.to_string());
        }

        logger::debug(
            LogTag::WsHub,
            &format!("Client {} subscribed to {}", client_id, channel),
        );

        self.send_to_client(client_id, &WebSocketMessage::subscription_ack(channel, "subscribe"))
            .await
    }

    /// False only if the client is unknown; leaving an unjoined channel is fine
    pub async fn unsubscribe_from_channel(&self, client_id: &str, channel: Channel) -> bool {
        let mut connections = self.connections.write().await;
        let Some(conn) = connections.get_mut(client_id) else {
            return false;
        };
        conn.subscribed_channels.remove(&channel);

        let mut subscribers = self.channel_subscribers.write().await;
        if let Some(ids) = subscribers.get_mut(&channel) {
            ids.remove(client_id);
        }

        logger::debug(
            LogTag::WsHub,
            &format!("Client {} unsubscribed from {}", client_id, channel),
        );
        true
    }

    /// Sorted subscriber ids of a channel
    pub async fn subscribers(&self, channel: Channel) -> Vec<String> {
        let subscribers = self.channel_subscribers.read().await;
        let mut ids: Vec<String> = subscribers
            .get(&channel)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub async fn client_channels(&self, client_id: &str) -> Option<Vec<Channel>> {
        let connections = self.connections.read().await;
        let conn = connections.get(client_id)?;
        let mut channels: Vec<Channel> = conn.subscribed_channels.iter().copied().collect();
        channels.sort();
        Some(channels)
    }

    // ------------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------------

    /// Fan a message out to a channel's subscribers; returns deliveries made
    ///
    /// `Channel::All` reaches every connected client.
    pub async fn broadcast_to_channel(&self, channel: Channel, message: &WebSocketMessage) -> usize {
        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                logger::error(
                    LogTag::WsHub,
                    &format!("Failed to encode broadcast for {}: {}", channel, e),
                );
                return 0;
            }
        };

        let targets: Vec<DeliveryTarget> = {
            let connections = self.connections.read().await;
            if channel == Channel::All {
                connections.values().map(DeliveryTarget::from_connection).collect()
            } else {
                let subscribers = self.channel_subscribers.read().await;
                subscribers
                    .get(&channel)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| connections.get(id))
                            .map(DeliveryTarget::from_connection)
                            .collect()
                    })
                    .unwrap_or_default()
            }
        };

        if targets.is_empty() {
            return 0;
        }

        let results = join_all(
            targets
                .iter()
                .map(|target| self.deliver(target, json.clone())),
        )
        .await;

        let mut delivered = 0;
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    logger::warning(
                        LogTag::WsHub,
                        &format!("Broadcast to {} failed: {}", target.client_id, e),
                    );
                    self.release_socket(&target.client_id, &target.socket, &format!("Send failed: {}", e))
                        .await;
                }
            }
        }

        if is_debug_ws_hub_enabled() {
            logger::debug(
                LogTag::WsHub,
                &format!(
                    "Broadcast {:?} on {}: {}/{} delivered",
                    message.message_type,
                    channel,
                    delivered,
                    targets.len()
                ),
            );
        }

        delivered
    }

    /// Unicast; a failed send disconnects the client and returns false
    pub async fn send_to_client(&self, client_id: &str, message: &WebSocketMessage) -> bool {
        let target = match self.connections.read().await.get(client_id) {
            Some(conn) => DeliveryTarget::from_connection(conn),
            None => return false,
        };

        let json = match message.to_json() {
            Ok(json) => json,
            Err(e) => {
                logger::error(
                    LogTag::WsHub,
                    &format!("Failed to encode message for {}: {}", client_id, e),
                );
                return false;
            }
        };

        match self.deliver(&target, json).await {
            Ok(()) => true,
            Err(e) => {
                logger::warning(
                    LogTag::WsHub,
                    &format!("Send to {} failed: {}", client_id, e),
                );
                self.release_socket(client_id, &target.socket, &format!("Send failed: {}", e))
                    .await;
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    /// Process one inbound text frame; malformed input is logged and dropped
    pub async fn handle_client_message(&self, client_id: &str, raw: &str) {
        let message = match WebSocketMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                self.metrics.message_rejected();
                logger::warning(
                    LogTag::WsHub,
                    &format!("Dropping malformed message from {}: {}", client_id, e),
                );
                return;
            }
        };

        if !self.touch_client(client_id).await {
            logger::debug(
                LogTag::WsHub,
                &format!("Message from unknown client {} ignored", client_id),
            );
            return;
        }

        match message.message_type {
            MessageType::Heartbeat => {
                self.send_to_client(client_id, &WebSocketMessage::heartbeat_reply())
                    .await;
            }
            MessageType::Subscribe => {
                if let Some(channel) = self.requested_channel(client_id, &message) {
                    self.subscribe_to_channel(client_id, channel).await;
                }
            }
            MessageType::Unsubscribe => {
                if let Some(channel) = self.requested_channel(client_id, &message) {
                    self.unsubscribe_from_channel(client_id, channel).await;
                }
            }
            // Older clients send subscription changes as a subscription_ack with data.action
            MessageType::SubscriptionAck => {
                let Some(channel) = self.requested_channel(client_id, &message) else {
                    return;
                };
                match message.data.get("action").and_then(Value::as_str) {
                    Some("subscribe") => {
                        self.subscribe_to_channel(client_id, channel).await;
                    }
                    Some("unsubscribe") => {
                        self.unsubscribe_from_channel(client_id, channel).await;
                    }
                    other => {
                        logger::warning(
                            LogTag::WsHub,
                            &format!(
                                "Subscription request from {} has unknown action {:?}",
                                client_id, other
                            ),
                        );
                    }
                }
            }
            other => {
                logger::debug(
                    LogTag::WsHub,
                    &format!("No handler for {:?} from {}", other, client_id),
                );
            }
        }
    }

    /// Channel named by a subscription request; an invalid name drops the request
    fn requested_channel(&self, client_id: &str, message: &WebSocketMessage) -> Option<Channel> {
        match message.target_channel() {
            Ok(channel) => Some(channel),
            Err(e) => {
                self.metrics.message_rejected();
                logger::warning(
                    LogTag::WsHub,
                    &format!("Dropping subscription request from {}: {}", client_id, e),
                );
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    pub async fn get_connection_stats(&self) -> HubStats {
        let now = Instant::now();
        let connections = self.connections.read().await;
        let subscribers = self.channel_subscribers.read().await;

        let healthy_connections = connections
            .values()
            .filter(|conn| self.config.is_healthy(conn.last_heartbeat, now))
            .count();

        let channel_subscribers = Channel::ALL_CHANNELS
            .into_iter()
            .map(|channel| {
                let count = subscribers.get(&channel).map(HashSet::len).unwrap_or(0);
                (channel.as_str().to_string(), count)
            })
            .collect();

        HubStats {
            total_connections: connections.len(),
            channel_subscribers,
            healthy_connections,
            running: self.is_running(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Evict every connection past the heartbeat timeout; returns the count
    pub async fn cleanup_stale_connections(&self) -> usize {
        let now = Instant::now();
        let stale: Vec<(String, Arc<dyn ClientSocket>)> = self
            .connections
            .read()
            .await
            .values()
            .filter(|conn| !self.config.is_healthy(conn.last_heartbeat, now))
            .map(|conn| (conn.client_id.clone(), conn.socket.clone()))
            .collect();

        let mut evicted = 0;
        for (client_id, socket) in stale {
            if self.release_socket(&client_id, &socket, "Heartbeat timeout").await {
                evicted += 1;
            }
        }

        if evicted > 0 {
            logger::info(
                LogTag::WsHub,
                &format!("Evicted {} stale connection(s)", evicted),
            );
        }
        evicted
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn deliver(&self, target: &DeliveryTarget, text: String) -> Result<(), SocketError> {
        let result = match timeout(self.config.send_timeout, target.socket.send_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(SocketError::Timeout(self.config.send_timeout)),
        };

        match result {
            Ok(()) => {
                target.metrics.inc_sent();
                self.metrics.message_sent();
            }
            Err(_) => {
                target.metrics.inc_failed();
                self.metrics.message_failed();
            }
        }
        result
    }

    /// Drop the record and its subscriber entries
    ///
    /// With `expected`, only removes the record if it still holds that socket.
    async fn remove_connection(
        &self,
        client_id: &str,
        expected: Option<&Arc<dyn ClientSocket>>,
    ) -> Option<ClientConnection> {
        let mut connections = self.connections.write().await;
        if let Some(expected) = expected {
            match connections.get(client_id) {
                Some(conn) if conn.owns_socket(expected) => {}
                _ => return None,
            }
        }
        let conn = connections.remove(client_id)?;

        let mut subscribers = self.channel_subscribers.write().await;
        for ids in subscribers.values_mut() {
            ids.remove(client_id);
        }
        Some(conn)
    }

    async fn finish_disconnect(&self, conn: ClientConnection, reason: &str) {
        self.close_socket(&conn.client_id, &conn.socket, reason).await;
        self.metrics.connection_closed();

        let stats = conn.metrics.snapshot();
        logger::info(
            LogTag::WsHub,
            &format!(
                "Client {} disconnected: {} (connected since {}, sent={}, failed={}, received={})",
                conn.client_id,
                reason,
                conn.connected_at.to_rfc3339(),
                stats.messages_sent,
                stats.messages_failed,
                stats.messages_received
            ),
        );
    }

    async fn close_socket(&self, client_id: &str, socket: &Arc<dyn ClientSocket>, reason: &str) {
        match timeout(self.config.send_timeout, socket.close(reason)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => logger::debug(
                LogTag::WsHub,
                &format!("Close for {} failed: {}", client_id, e),
            ),
            Err(_) => logger::debug(
                LogTag::WsHub,
                &format!("Close for {} timed out", client_id),
            ),
        }
    }
}

// ============================================================================
// BACKGROUND LOOPS
// ============================================================================

async fn run_heartbeat_loop(
    hub: Weak<WebSocketHub>,
    mut shutdown: watch::Receiver<bool>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let Some(hub) = hub.upgrade() else { break };
                if !hub.is_running() {
                    break;
                }
                let delivered = hub
                    .broadcast_to_channel(Channel::All, &WebSocketMessage::heartbeat())
                    .await;
                logger::debug(
                    LogTag::WsHub,
                    &format!("Heartbeat delivered to {} client(s)", delivered),
                );
            }
        }
    }

    logger::debug(LogTag::WsHub, "Heartbeat loop stopped");
}

async fn run_cleanup_loop(
    hub: Weak<WebSocketHub>,
    mut shutdown: watch::Receiver<bool>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let Some(hub) = hub.upgrade() else { break };
                if !hub.is_running() {
                    break;
                }
                hub.cleanup_stale_connections().await;
            }
        }
    }

    logger::debug(LogTag::WsHub, "Cleanup loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::connection::MemorySocket;
    use serde_json::json;

    fn hub() -> Arc<WebSocketHub> {
        Arc::new(WebSocketHub::new(HealthConfig::default()))
    }

    async fn connect(hub: &WebSocketHub, id: &str) -> Arc<MemorySocket> {
        let socket = MemorySocket::new();
        assert!(hub.connect_client(id, socket.clone(), None).await);
        socket
    }

    fn types_of(socket: &MemorySocket) -> Vec<String> {
        socket
            .sent_json()
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn event() -> WebSocketMessage {
        WebSocketMessage::with_payload(MessageType::NewPair, Channel::Discovery, json!({"pair": "0xabc"}))
    }

    #[tokio::test]
    async fn test_connect_sends_ack() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;

        let frames = socket.sent_json();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "connection_ack");
        assert_eq!(frames[0]["client_id"], "c1");
        assert_eq!(frames[0]["data"]["available_channels"].as_array().map(Vec::len), Some(4));

        let stats = hub.get_connection_stats().await;
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.healthy_connections, 1);
        assert!(!stats.running);
    }

    #[tokio::test]
    async fn test_failed_ack_leaves_no_state() {
        let hub = hub();
        let socket = MemorySocket::new();
        socket.set_failing(true);

        assert!(!hub.connect_client("c1", socket.clone(), None).await);
        assert!(!hub.is_connected("c1").await);
        assert_eq!(hub.get_connection_stats().await.total_connections, 0);
        assert_eq!(hub.metrics().snapshot().connections_opened, 0);
        assert!(socket.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_ack_times_out() {
        let hub = hub();
        let socket = MemorySocket::new();
        socket.set_hanging(true);

        assert!(!hub.connect_client("c1", socket, None).await);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_client_id_rejected() {
        let hub = hub();
        assert!(!hub.connect_client("", MemorySocket::new(), None).await);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_previous_socket() {
        let hub = hub();
        let old = connect(&hub, "c1").await;
        assert!(hub.subscribe_to_channel("c1", Channel::Discovery).await);

        let new = connect(&hub, "c1").await;
        assert!(old.is_closed());
        assert_eq!(old.close_reason().as_deref(), Some("Replaced by new connection"));
        assert!(!new.is_closed());
        assert_eq!(hub.connection_count().await, 1);
        assert!(hub.subscribers(Channel::Discovery).await.is_empty());

        // The stale driver exiting must not remove the new registration
        let old_handle: Arc<dyn ClientSocket> = old;
        assert!(!hub.release_socket("c1", &old_handle, "Client disconnected").await);
        assert!(hub.is_connected("c1").await);
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;

        assert!(hub.subscribe_to_channel("c1", Channel::Discovery).await);
        assert!(hub.subscribe_to_channel("c1", Channel::Discovery).await);

        assert_eq!(hub.subscribers(Channel::Discovery).await, vec!["c1".to_string()]);
        assert_eq!(hub.client_channels("c1").await, Some(vec![Channel::Discovery]));
        assert_eq!(
            types_of(&socket),
            vec!["connection_ack", "subscription_ack", "subscription_ack"]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_requires_connection() {
        let hub = hub();
        connect(&hub, "c1").await;

        assert!(hub.unsubscribe_from_channel("c1", Channel::Autotrade).await);
        assert!(!hub.unsubscribe_from_channel("ghost", Channel::Autotrade).await);
        assert!(!hub.subscribe_to_channel("ghost", Channel::Autotrade).await);

        hub.subscribe_to_channel("c1", Channel::Autotrade).await;
        assert!(hub.unsubscribe_from_channel("c1", Channel::Autotrade).await);
        assert!(hub.subscribers(Channel::Autotrade).await.is_empty());
        assert_eq!(hub.client_channels("c1").await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failing_subscriber() {
        let hub = hub();
        let a = connect(&hub, "a").await;
        let b = connect(&hub, "b").await;
        let c = connect(&hub, "c").await;
        for id in ["a", "b", "c"] {
            hub.subscribe_to_channel(id, Channel::Discovery).await;
        }
        a.set_failing(true);

        assert_eq!(hub.broadcast_to_channel(Channel::Discovery, &event()).await, 2);

        assert!(!hub.is_connected("a").await);
        assert!(hub.is_connected("b").await);
        assert!(hub.is_connected("c").await);
        assert!(a.is_closed());
        assert_eq!(types_of(&b).last().map(String::as_str), Some("new_pair"));
        assert_eq!(types_of(&c).last().map(String::as_str), Some("new_pair"));
        assert_eq!(hub.subscribers(Channel::Discovery).await, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_broadcast_only_reaches_subscribers() {
        let hub = hub();
        let subscribed = connect(&hub, "s").await;
        let idle = connect(&hub, "i").await;
        hub.subscribe_to_channel("s", Channel::Discovery).await;

        assert_eq!(hub.broadcast_to_channel(Channel::Discovery, &event()).await, 1);
        assert_eq!(hub.broadcast_to_channel(Channel::Autotrade, &event()).await, 0);
        assert!(types_of(&subscribed).contains(&"new_pair".to_string()));
        assert!(!types_of(&idle).contains(&"new_pair".to_string()));

        // `all` reaches everyone regardless of subscriptions
        assert_eq!(hub.broadcast_to_channel(Channel::All, &WebSocketMessage::heartbeat()).await, 2);
        assert_eq!(types_of(&idle).last().map(String::as_str), Some("heartbeat"));
    }

    #[tokio::test]
    async fn test_subscriber_dropping_mid_session() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;
        hub.subscribe_to_channel("c1", Channel::Discovery).await;

        assert_eq!(hub.broadcast_to_channel(Channel::Discovery, &event()).await, 1);

        socket.set_failing(true);
        assert_eq!(hub.broadcast_to_channel(Channel::Discovery, &event()).await, 0);
        assert_eq!(hub.broadcast_to_channel(Channel::Discovery, &event()).await, 0);
        assert_eq!(hub.get_connection_stats().await.total_connections, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_send_does_not_block_broadcast() {
        let hub = hub();
        let stuck = connect(&hub, "stuck").await;
        let ok = connect(&hub, "ok").await;
        hub.subscribe_to_channel("stuck", Channel::System).await;
        hub.subscribe_to_channel("ok", Channel::System).await;
        stuck.set_hanging(true);

        assert_eq!(hub.broadcast_to_channel(Channel::System, &event()).await, 1);
        assert!(!hub.is_connected("stuck").await);
        assert_eq!(types_of(&ok).last().map(String::as_str), Some("new_pair"));
    }

    #[tokio::test]
    async fn test_send_to_client() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;

        assert!(hub.send_to_client("c1", &WebSocketMessage::error("bad request")).await);
        assert!(!hub.send_to_client("ghost", &WebSocketMessage::error("x")).await);

        socket.set_failing(true);
        assert!(!hub.send_to_client("c1", &WebSocketMessage::error("x")).await);
        assert!(!hub.is_connected("c1").await);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;
        hub.subscribe_to_channel("c1", Channel::System).await;

        hub.disconnect_client("c1", "bye").await;
        hub.disconnect_client("c1", "bye").await;
        hub.disconnect_client("never-seen", "bye").await;

        assert_eq!(socket.close_reason().as_deref(), Some("bye"));
        assert!(hub.subscribers(Channel::System).await.is_empty());
        assert_eq!(hub.metrics().snapshot().connections_closed, 1);
    }

    #[tokio::test]
    async fn test_client_messages_dispatch() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;

        hub.handle_client_message("c1", r#"{"type":"subscribe","channel":"discovery"}"#)
            .await;
        assert_eq!(hub.subscribers(Channel::Discovery).await, vec!["c1"]);

        hub.handle_client_message("c1", r#"{"type":"heartbeat"}"#).await;
        let reply = socket.sent_json().pop().unwrap();
        assert_eq!(reply["type"], "heartbeat");
        assert_eq!(reply["data"]["pong"], true);

        hub.handle_client_message(
            "c1",
            r#"{"type":"subscription_ack","channel":"system","data":{"channel":"discovery","action":"unsubscribe"}}"#,
        )
        .await;
        assert!(hub.subscribers(Channel::Discovery).await.is_empty());

        hub.handle_client_message("c1", r#"{"type":"unsubscribe","data":{"channel":"autotrade"}}"#)
            .await;
        assert!(hub.is_connected("c1").await);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;

        hub.handle_client_message("c1", "{not json").await;
        hub.handle_client_message("c1", r#"{"type":"warp_drive"}"#).await;
        hub.handle_client_message("c1", r#"{"type":"subscribe","channel":"moon"}"#)
            .await;

        assert!(hub.is_connected("c1").await);
        assert_eq!(socket.sent().len(), 1);
        assert_eq!(hub.metrics().snapshot().messages_rejected, 3);
    }

    #[tokio::test]
    async fn test_misspelled_data_channel_subscribes_nowhere() {
        let hub = hub();
        let socket = connect(&hub, "c1").await;

        hub.handle_client_message("c1", r#"{"type":"subscribe","data":{"channel":"discovry"}}"#)
            .await;
        hub.handle_client_message(
            "c1",
            r#"{"type":"subscription_ack","data":{"channel":"sytem","action":"subscribe"}}"#,
        )
        .await;

        for channel in Channel::ALL_CHANNELS {
            assert!(hub.subscribers(channel).await.is_empty());
        }
        assert!(hub.client_channels("c1").await.map_or(true, |c| c.is_empty()));
        assert_eq!(socket.sent().len(), 1);
        assert_eq!(hub.metrics().snapshot().messages_rejected, 2);
        assert!(hub.is_connected("c1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_connection_is_unhealthy_then_evicted() {
        let hub = hub();
        let stale = connect(&hub, "stale").await;
        tokio::time::advance(Duration::from_secs(40)).await;
        connect(&hub, "fresh").await;
        tokio::time::advance(Duration::from_secs(21)).await;

        let stats = hub.get_connection_stats().await;
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.healthy_connections, 1);

        assert_eq!(hub.cleanup_stale_connections().await, 1);
        assert!(!hub.is_connected("stale").await);
        assert!(hub.is_connected("fresh").await);
        assert_eq!(stale.close_reason().as_deref(), Some("Heartbeat timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_message_keeps_connection_alive() {
        let hub = hub();
        connect(&hub, "c1").await;

        tokio::time::advance(Duration::from_secs(50)).await;
        hub.handle_client_message("c1", r#"{"type":"heartbeat"}"#).await;
        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(hub.cleanup_stale_connections().await, 0);
        assert!(hub.is_connected("c1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_loop_evicts_silent_client() {
        let hub = hub();
        hub.start();
        let socket = connect(&hub, "c2").await;
        assert_eq!(hub.get_connection_stats().await.total_connections, 1);

        tokio::time::sleep(Duration::from_secs(61)).await;

        let stats = hub.get_connection_stats().await;
        assert_eq!(stats.total_connections, 0);
        assert!(stats.running);
        assert!(types_of(&socket).contains(&"heartbeat".to_string()));
        assert_eq!(socket.close_reason().as_deref(), Some("Heartbeat timeout"));

        hub.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_lifecycle() {
        let hub = hub();
        hub.start();
        hub.start();
        assert!(hub.is_running());
        assert_eq!(hub.tasks.lock().len(), 2);

        let a = connect(&hub, "a").await;
        let b = connect(&hub, "b").await;

        hub.stop().await;
        assert!(!hub.is_running());
        assert_eq!(hub.connection_count().await, 0);
        assert!(a.is_closed() && b.is_closed());
        assert!(hub.tasks.lock().is_empty());

        hub.stop().await;
        hub.start();
        assert!(hub.is_running());
        hub.stop().await;
    }

    #[tokio::test]
    async fn test_stats_list_every_channel() {
        let hub = hub();
        connect(&hub, "c1").await;
        hub.subscribe_to_channel("c1", Channel::Autotrade).await;

        let stats = hub.get_connection_stats().await;
        assert_eq!(stats.channel_subscribers.len(), 4);
        assert_eq!(stats.channel_subscribers["autotrade"], 1);
        assert_eq!(stats.channel_subscribers["all"], 0);
    }
}
