//! Circuit breaker configuration

use crate::config::RpcConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip a closed breaker
    pub failure_threshold: u32,
    /// Cooldown before an open breaker admits a probe
    pub open_duration: Duration,
    /// Probe successes needed to close a half-open breaker
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn from_rpc_config(rpc: &RpcConfig) -> Self {
        Self {
            failure_threshold: rpc.breaker_failure_threshold.max(1),
            open_duration: Duration::from_secs(rpc.breaker_open_duration_secs.max(1)),
            success_threshold: rpc.breaker_success_threshold.max(1),
        }
    }
}
