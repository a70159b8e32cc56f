/// Shared application state for the webserver
///
/// Holds the services route handlers read from; cloned per request.
use crate::config::WebserverConfig;
use crate::context::AppContext;
use crate::rpc::RpcPool;
use crate::webserver::ws::WebSocketHub;
use std::sync::Arc;

/// Shared application state passed to all route handlers
#[derive(Clone)]
pub struct AppState {
    /// Webserver configuration
    pub config: Arc<WebserverConfig>,

    /// Server startup time
    pub startup_time: chrono::DateTime<chrono::Utc>,

    pub pool: Arc<RpcPool>,

    pub hub: Arc<WebSocketHub>,
}

impl AppState {
    pub fn new(config: WebserverConfig, pool: Arc<RpcPool>, hub: Arc<WebSocketHub>) -> Self {
        Self {
            config: Arc::new(config),
            startup_time: chrono::Utc::now(),
            pool,
            hub,
        }
    }

    pub fn from_context(ctx: &AppContext) -> Self {
        Self::new(ctx.config.webserver.clone(), ctx.pool.clone(), ctx.hub.clone())
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        let duration = chrono::Utc::now() - self.startup_time;
        duration.num_seconds().max(0) as u64
    }
}
