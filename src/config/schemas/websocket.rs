// WebSocket hub configuration schema

// ============================================================================
// WEBSOCKET HUB CONFIGURATION
// ============================================================================

config_struct! {
    /// Hub timing: heartbeat broadcast, stale-connection sweep and send bounds
    pub struct WebSocketHubConfig {
        /// Seconds between heartbeat broadcasts to the `all` channel
        heartbeat_interval_secs: u64 = 30,

        /// Seconds between stale-connection sweeps
        cleanup_interval_secs: u64 = 60,

        /// A connection is healthy while its last heartbeat is younger than this
        heartbeat_timeout_secs: u64 = 60,

        /// Upper bound for a single socket send
        send_timeout_secs: u64 = 5,
    }
}
