/// Subsystem tags attached to every log line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Rpc,
    RpcPool,
    CircuitBreaker,
    WsHub,
    Webserver,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug-<key>` flags and `enabled_tags` filtering
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Rpc => "rpc".to_string(),
            LogTag::RpcPool => "rpc-pool".to_string(),
            LogTag::CircuitBreaker => "breaker".to_string(),
            LogTag::WsHub => "ws-hub".to_string(),
            LogTag::Webserver => "webserver".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Uncolored label written to log files
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::Rpc => "RPC".to_string(),
            LogTag::RpcPool => "RPCPOOL".to_string(),
            LogTag::CircuitBreaker => "BREAKER".to_string(),
            LogTag::WsHub => "WSHUB".to_string(),
            LogTag::Webserver => "WEBSERVER".to_string(),
            LogTag::Test => "TEST".to_string(),
            LogTag::Other(s) => s.to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
