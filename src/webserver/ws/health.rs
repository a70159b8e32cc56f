/// Hub timing and connection health rules
use std::time::Duration;
use tokio::time::Instant;

use crate::config::WebSocketHubConfig;

// ============================================================================
// HEALTH CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// Server heartbeat broadcast period
    pub heartbeat_interval: Duration,

    /// Stale-connection sweep period
    pub cleanup_interval: Duration,

    /// Healthy while the last inbound message is younger than this
    pub heartbeat_timeout: Duration,

    /// Bound for a single socket send or close
    pub send_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(60),
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl HealthConfig {
    pub fn from_config(config: &WebSocketHubConfig) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs.max(1)),
            heartbeat_timeout: Duration::from_secs(config.heartbeat_timeout_secs.max(1)),
            send_timeout: Duration::from_secs(config.send_timeout_secs.max(1)),
        }
    }

    pub fn is_healthy(&self, last_heartbeat: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_heartbeat) < self.heartbeat_timeout
    }
}
