//! Health aggregation over a chain's endpoints

use std::collections::BTreeMap;
use std::sync::Arc;

use super::endpoint::RpcEndpoint;
use super::types::{ChainHealth, CircuitState};

pub fn chain_health(endpoints: &[Arc<RpcEndpoint>]) -> ChainHealth {
    let endpoint_health: Vec<_> = endpoints.iter().map(|ep| ep.health()).collect();

    let count = |state: CircuitState| endpoint_health.iter().filter(|e| e.state == state).count();
    let latencies: Vec<f64> = endpoint_health
        .iter()
        .filter_map(|e| e.last_latency_ms)
        .collect();
    let last_errors: BTreeMap<String, String> = endpoints
        .iter()
        .filter_map(|ep| ep.last_error().map(|err| (ep.url().to_string(), err)))
        .collect();

    ChainHealth {
        providers_up: count(CircuitState::Closed),
        providers_half_open: count(CircuitState::HalfOpen),
        providers_open: count(CircuitState::Open),
        p50_latency_ms: median(&latencies),
        last_errors,
        endpoints: endpoint_health,
    }
}

/// Median; the mean of the two middle samples for even counts
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
