/// Process-wide service context
///
/// Owns the single RPC pool and WebSocket hub built from the loaded
/// configuration. Consumers receive the `Arc`s they need at construction;
/// nothing here is reachable through a global.
use std::sync::Arc;
use tokio::sync::Notify;

use crate::config::Config;
use crate::logger::{self, LogTag};
use crate::rpc::RpcPool;
use crate::webserver::ws::WebSocketHub;

pub struct AppContext {
    pub config: Arc<Config>,
    pub pool: Arc<RpcPool>,
    pub hub: Arc<WebSocketHub>,
    /// Signalled once to stop the webserver
    pub shutdown: Arc<Notify>,
}

impl AppContext {
    pub fn from_config(config: Config) -> Result<Self, String> {
        let pool = RpcPool::from_config(&config.rpc)?;
        let hub = WebSocketHub::from_config(&config.websocket);

        Ok(Self {
            config: Arc::new(config),
            pool: Arc::new(pool),
            hub: Arc::new(hub),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Start background services; must be called inside a tokio runtime
    pub fn start(&self) {
        self.hub.start();
        logger::info(
            LogTag::System,
            &format!(
                "Services started (rpc mode {}, chains: {})",
                self.pool.mode(),
                self.pool.chains().join(", ")
            ),
        );
    }

    /// Stop the webserver, the hub loops and every client, then the pool
    pub async fn shutdown(&self) {
        self.shutdown.notify_one();
        self.hub.stop().await;
        self.pool.close().await;
        logger::info(LogTag::System, "Services stopped");
    }
}
