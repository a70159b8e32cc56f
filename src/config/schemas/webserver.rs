// Webserver configuration schema

// ============================================================================
// WEBSERVER CONFIGURATION
// ============================================================================

config_struct! {
    /// HTTP server hosting the hub socket and health views
    pub struct WebserverConfig {
        /// Start the HTTP server at all
        enabled: bool = true,

        /// IP to bind: 127.0.0.1 = localhost only, 0.0.0.0 = all interfaces
        host: String = "127.0.0.1".to_string(),

        port: u16 = 8080,
    }
}
