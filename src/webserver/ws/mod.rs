/// Real-time WebSocket hub
///
/// One `/ws` endpoint per client; the hub fans messages out by channel
/// (`autotrade`, `discovery`, `system`, `all`) and evicts clients that stop
/// sending frames.
///
/// ## Key Components
/// - `hub`: connection registry, subscriptions, broadcast, background loops
/// - `connection`: socket abstraction, connection record, axum driver
/// - `message`: envelope, channel and message-type schemas
/// - `health`: heartbeat timing and the healthy-connection rule
/// - `metrics`: delivery counters for monitoring
pub mod connection;
pub mod health;
pub mod hub;
pub mod message;
pub mod metrics;

pub use connection::{serve_socket, ClientSocket, MemorySocket};
pub use health::HealthConfig;
pub use hub::{HubStats, WebSocketHub};
pub use message::{Channel, MessageType, WebSocketMessage};
