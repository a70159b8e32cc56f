// RPC pool configuration schema

use crate::rpc::RpcMode;
use std::collections::BTreeMap;

// ============================================================================
// RPC POOL CONFIGURATION
// ============================================================================

config_struct! {
    /// Upstream JSON-RPC endpoints and pool tuning
    ///
    /// ```toml
    /// [rpc]
    /// mode = "pro"
    ///
    /// [rpc.chains]
    /// ethereum = ["https://eth.example.org", "https://eth-backup.example.org"]
    /// ```
    pub struct RpcConfig {
        /// Budget profile: "free" or "pro"
        mode: RpcMode = RpcMode::Free,

        /// Chain name -> endpoint URLs
        chains: BTreeMap<String, Vec<String>> = BTreeMap::new(),

        /// Shuffle endpoint order when a chain is registered
        shuffle_endpoints: bool = true,

        // Circuit breaker tuning (applies to every endpoint)
        breaker_failure_threshold: u32 = 5,
        breaker_open_duration_secs: u64 = 30,
        breaker_success_threshold: u32 = 1,
    }
}
