//! Shared RPC pool types: breaker states, budget profiles and health snapshots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// CIRCUIT STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Selection priority: Closed first, Open as a last resort
    pub fn rank(&self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::HalfOpen => 1,
            CircuitState::Open => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// MODE & BUDGETS
// =============================================================================

/// Named budget profile, fixed when the pool is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcMode {
    Free,
    Pro,
}

impl RpcMode {
    pub fn budget(&self) -> ModeBudget {
        match self {
            RpcMode::Free => ModeBudget {
                connect_timeout: Duration::from_millis(1500),
                read_timeout: Duration::from_millis(2500),
                retries: 2,
                max_providers_per_call: 3,
            },
            RpcMode::Pro => ModeBudget {
                connect_timeout: Duration::from_millis(800),
                read_timeout: Duration::from_millis(1200),
                retries: 1,
                max_providers_per_call: 2,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMode::Free => "free",
            RpcMode::Pro => "pro",
        }
    }
}

impl FromStr for RpcMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(RpcMode::Free),
            "pro" => Ok(RpcMode::Pro),
            other => Err(format!("unknown RPC mode '{}' (expected free or pro)", other)),
        }
    }
}

impl std::fmt::Display for RpcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timeout and retry budget applied to every `json_rpc` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeBudget {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Extra attempts per endpoint after the first
    pub retries: u32,
    /// Endpoints actually attempted per call
    pub max_providers_per_call: usize,
}

impl ModeBudget {
    pub fn attempts_per_endpoint(&self) -> u32 {
        self.retries + 1
    }

    /// Whole-request bound for a single attempt
    pub fn request_timeout(&self) -> Duration {
        self.connect_timeout + self.read_timeout
    }
}

// =============================================================================
// HEALTH SNAPSHOTS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealth {
    pub url: String,
    pub state: CircuitState,
    pub weight: u32,
    pub last_latency_ms: Option<f64>,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Milliseconds until an open breaker admits a probe
    pub retry_in_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainHealth {
    pub endpoints: Vec<EndpointHealth>,
    pub providers_up: usize,
    pub providers_half_open: usize,
    pub providers_open: usize,
    /// Median of the last recorded latency of each endpoint that has one
    pub p50_latency_ms: Option<f64>,
    /// URL -> last error, only for endpoints that have one
    pub last_errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolHealth {
    pub mode: RpcMode,
    pub closed: bool,
    pub chains: BTreeMap<String, ChainHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_budgets() {
        let free = RpcMode::Free.budget();
        assert_eq!(free.connect_timeout, Duration::from_millis(1500));
        assert_eq!(free.read_timeout, Duration::from_millis(2500));
        assert_eq!(free.attempts_per_endpoint(), 3);
        assert_eq!(free.max_providers_per_call, 3);

        let pro = RpcMode::Pro.budget();
        assert_eq!(pro.request_timeout(), Duration::from_millis(2000));
        assert_eq!(pro.attempts_per_endpoint(), 2);
        assert_eq!(pro.max_providers_per_call, 2);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("PRO".parse::<RpcMode>(), Ok(RpcMode::Pro));
        assert_eq!(" free ".parse::<RpcMode>(), Ok(RpcMode::Free));
        assert!("paid".parse::<RpcMode>().is_err());
    }

    #[test]
    fn test_state_rank_order() {
        assert!(CircuitState::Closed.rank() < CircuitState::HalfOpen.rank());
        assert!(CircuitState::HalfOpen.rank() < CircuitState::Open.rank());
        assert_eq!(serde_json::to_string(&CircuitState::HalfOpen).unwrap(), "\"half_open\"");
    }
}
