//! One upstream JSON-RPC URL with its breaker and call statistics

use parking_lot::Mutex;
use std::time::Duration;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::types::{CircuitState, EndpointHealth};

#[derive(Debug, Default, Clone)]
struct EndpointStats {
    last_latency_ms: Option<f64>,
    consecutive_failures: u32,
    last_error: Option<String>,
    total_successes: u64,
    total_failures: u64,
}

#[derive(Debug)]
pub struct RpcEndpoint {
    url: String,
    /// Declared weight; carried through to health output, not used for selection
    weight: u32,
    breaker: CircuitBreaker,
    stats: Mutex<EndpointStats>,
}

impl RpcEndpoint {
    pub fn new(url: &str, weight: u32, breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            url: url.to_string(),
            weight,
            breaker: CircuitBreaker::new(url, breaker_config),
            stats: Mutex::new(EndpointStats::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn mark_success(&self, latency: Duration) {
        {
            let mut stats = self.stats.lock();
            stats.last_latency_ms = Some(latency.as_secs_f64() * 1000.0);
            stats.consecutive_failures = 0;
            stats.total_successes += 1;
        }
        self.breaker.on_success();
    }

    pub fn mark_failure(&self, error: &str) {
        {
            let mut stats = self.stats.lock();
            stats.consecutive_failures += 1;
            stats.total_failures += 1;
            stats.last_error = Some(error.to_string());
        }
        self.breaker.on_failure();
    }

    pub fn last_latency_ms(&self) -> Option<f64> {
        self.stats.lock().last_latency_ms
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.stats.lock().consecutive_failures
    }

    pub fn last_error(&self) -> Option<String> {
        self.stats.lock().last_error.clone()
    }

    /// Sort key: breaker state, then latency (unknown sorts last), then failures
    pub fn rank_key(&self) -> (u8, f64, u32) {
        let stats = self.stats.lock();
        (
            self.breaker.state().rank(),
            stats.last_latency_ms.unwrap_or(f64::INFINITY),
            stats.consecutive_failures,
        )
    }

    pub fn health(&self) -> EndpointHealth {
        let stats = self.stats.lock().clone();
        EndpointHealth {
            url: self.url.clone(),
            state: self.breaker.state(),
            weight: self.weight,
            last_latency_ms: stats.last_latency_ms,
            consecutive_failures: stats.consecutive_failures,
            total_successes: stats.total_successes,
            total_failures: stats.total_failures,
            retry_in_ms: self
                .breaker
                .time_until_retry()
                .map(|d| d.as_millis() as u64),
        }
    }

    pub fn is_open(&self) -> bool {
        self.breaker.state() == CircuitState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(threshold: u32) -> RpcEndpoint {
        RpcEndpoint::new(
            "https://rpc.example.org",
            1,
            CircuitBreakerConfig {
                failure_threshold: threshold,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_success_clears_failure_streak() {
        let ep = endpoint(5);
        ep.mark_failure("HTTP 502");
        ep.mark_failure("HTTP 502");
        assert_eq!(ep.consecutive_failures(), 2);

        ep.mark_success(Duration::from_millis(42));
        assert_eq!(ep.consecutive_failures(), 0);
        assert_eq!(ep.last_latency_ms(), Some(42.0));
        // Last error is kept for diagnostics
        assert_eq!(ep.last_error().as_deref(), Some("HTTP 502"));

        let health = ep.health();
        assert_eq!(health.total_failures, 2);
        assert_eq!(health.total_successes, 1);
    }

    #[tokio::test]
    async fn test_failures_trip_breaker() {
        let ep = endpoint(2);
        ep.mark_failure("timeout");
        assert!(!ep.is_open());
        ep.mark_failure("timeout");
        assert!(ep.is_open());
        assert_eq!(ep.rank_key().0, CircuitState::Open.rank());
    }

    #[tokio::test]
    async fn test_unknown_latency_ranks_after_measured() {
        let fresh = endpoint(5);
        let measured = endpoint(5);
        measured.mark_success(Duration::from_millis(900));
        assert!(measured.rank_key() < fresh.rank_key());
    }
}
