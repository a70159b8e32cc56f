/// Configuration schemas, each defined once with embedded defaults
mod rpc;
mod websocket;
mod webserver;

pub use rpc::RpcConfig;
pub use webserver::WebserverConfig;
pub use websocket::WebSocketHubConfig;

config_struct! {
    /// Root configuration, one section per subsystem
    pub struct Config {
        rpc: RpcConfig = RpcConfig::default(),
        websocket: WebSocketHubConfig = WebSocketHubConfig::default(),
        webserver: WebserverConfig = WebserverConfig::default(),
    }
}
