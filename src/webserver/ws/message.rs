/// Hub message schema
///
/// Every frame in either direction is a JSON [`WebSocketMessage`]:
///
/// ```json
/// {"id":"…","type":"new_pair","channel":"discovery","data":{…},"timestamp":"2024-05-01T12:00:00.000Z"}
/// ```
///
/// Clients manage subscriptions with dedicated request types; the target
/// channel is the envelope `channel` (or `data.channel` when present):
///
/// ```json
/// {"type":"subscribe","channel":"discovery"}
/// {"type":"unsubscribe","channel":"discovery"}
/// {"type":"heartbeat"}
/// ```
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CHANNELS
// ============================================================================

/// Broadcast groups; `All` reaches every connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Autotrade,
    Discovery,
    System,
    All,
}

impl Channel {
    pub const ALL_CHANNELS: [Channel; 4] = [
        Channel::Autotrade,
        Channel::Discovery,
        Channel::System,
        Channel::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Autotrade => "autotrade",
            Channel::Discovery => "discovery",
            Channel::System => "system",
            Channel::All => "all",
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL_CHANNELS
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown channel '{}'", s))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// MESSAGE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Trading events
    EngineStatus,
    TradeExecuted,
    TradeFailed,
    PositionUpdate,
    RiskAlert,

    // Discovery events
    NewPair,
    OpportunityFound,

    // System
    SystemHealth,
    ConnectionAck,
    SubscriptionAck,
    Error,
    Heartbeat,

    // Client requests
    Subscribe,
    Unsubscribe,
}

// ============================================================================
// MESSAGE ENVELOPE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(default = "new_message_id")]
    pub id: String,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    #[serde(default = "default_channel")]
    pub channel: Channel,

    #[serde(default)]
    pub data: Map<String, Value>,

    /// RFC 3339, UTC
    #[serde(default = "now_timestamp")]
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_channel() -> Channel {
    Channel::System
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl WebSocketMessage {
    pub fn new(message_type: MessageType, channel: Channel, data: Map<String, Value>) -> Self {
        Self {
            id: new_message_id(),
            message_type,
            channel,
            data,
            timestamp: now_timestamp(),
            client_id: None,
        }
    }

    /// Build from a `json!({...})` payload; non-object values are wrapped as `{"value": …}`
    pub fn with_payload(message_type: MessageType, channel: Channel, payload: Value) -> Self {
        let data = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self::new(message_type, channel, data)
    }

    pub fn connection_ack(client_id: &str) -> Self {
        let channels: Vec<&str> = Channel::ALL_CHANNELS.iter().map(|c| c.as_str()).collect();
        let mut msg = Self::with_payload(
            MessageType::ConnectionAck,
            Channel::System,
            serde_json::json!({
                "client_id": client_id,
                "available_channels": channels,
                "message": "Connected to DEX Sniper hub",
            }),
        );
        msg.client_id = Some(client_id.to_string());
        msg
    }

    pub fn subscription_ack(channel: Channel, action: &str) -> Self {
        Self::with_payload(
            MessageType::SubscriptionAck,
            channel,
            serde_json::json!({ "channel": channel.as_str(), "action": action }),
        )
    }

    /// Server heartbeat broadcast
    pub fn heartbeat() -> Self {
        Self::with_payload(
            MessageType::Heartbeat,
            Channel::All,
            serde_json::json!({ "ping": true, "server_time": now_timestamp() }),
        )
    }

    /// Reply to a client heartbeat
    pub fn heartbeat_reply() -> Self {
        Self::with_payload(
            MessageType::Heartbeat,
            Channel::System,
            serde_json::json!({ "pong": true, "server_time": now_timestamp() }),
        )
    }

    pub fn error(message: &str) -> Self {
        Self::with_payload(
            MessageType::Error,
            Channel::System,
            serde_json::json!({ "error": message }),
        )
    }

    /// Parse an inbound frame; unknown `type` or `channel` values are errors
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Channel targeted by a subscribe/unsubscribe request
    ///
    /// `data.channel` wins when present and must then name a valid channel;
    /// without it the envelope channel is used.
    pub fn target_channel(&self) -> Result<Channel, String> {
        match self.data.get("channel") {
            None => Ok(self.channel),
            Some(Value::String(name)) => name.parse(),
            Some(other) => Err(format!("channel must be a string, got {}", other)),
        }
    }
}
