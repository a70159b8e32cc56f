//! Multi-chain JSON-RPC pool
//!
//! Each chain holds an endpoint list. A call ranks the endpoints (breaker
//! state, then latency, then failure streak), walks the top
//! `max_providers_per_call` of them sequentially and retries each one within
//! the mode budget. Attempts are never issued concurrently within one call.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::circuit_breaker::CircuitBreakerConfig;
use super::endpoint::RpcEndpoint;
use super::health::chain_health;
use super::retry::{backoff_delay, classify_body, next_step, AttemptOutcome, FailureKind, RetryStep};
use super::types::{CircuitState, ModeBudget, PoolHealth, RpcMode};
use crate::arguments::is_debug_rpc_pool_enabled;
use crate::config::RpcConfig;
use crate::errors::{RpcPoolError, RpcResult};
use crate::logger::{self, LogTag};

/// Default weight for endpoints registered from plain URL lists
const DEFAULT_ENDPOINT_WEIGHT: u32 = 1;

type EndpointList = Arc<Vec<Arc<RpcEndpoint>>>;

/// Construction options beyond the mode itself
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Replaces the mode's budget as a whole
    pub budget: Option<ModeBudget>,
    pub breaker: CircuitBreakerConfig,
    pub shuffle_endpoints: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            budget: None,
            breaker: CircuitBreakerConfig::default(),
            shuffle_endpoints: true,
        }
    }
}

pub struct RpcPool {
    mode: RpcMode,
    budget: ModeBudget,
    breaker_config: CircuitBreakerConfig,
    shuffle_endpoints: bool,
    /// Shared HTTP client; `None` once the pool is closed
    client: RwLock<Option<reqwest::Client>>,
    chains: RwLock<HashMap<String, EndpointList>>,
}

impl RpcPool {
    pub fn new(mode: RpcMode) -> Result<Self, String> {
        Self::with_options(mode, PoolOptions::default())
    }

    pub fn with_options(mode: RpcMode, options: PoolOptions) -> Result<Self, String> {
        let budget = options.budget.unwrap_or_else(|| mode.budget());
        let client = reqwest::Client::builder()
            .connect_timeout(budget.connect_timeout)
            .user_agent(concat!("dexsniper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        logger::info(
            LogTag::RpcPool,
            &format!(
                "RPC pool created (mode={}, connect={:?}, read={:?}, retries={}, max_providers={})",
                mode,
                budget.connect_timeout,
                budget.read_timeout,
                budget.retries,
                budget.max_providers_per_call
            ),
        );

        Ok(Self {
            mode,
            budget,
            breaker_config: options.breaker,
            shuffle_endpoints: options.shuffle_endpoints,
            client: RwLock::new(Some(client)),
            chains: RwLock::new(HashMap::new()),
        })
    }

    /// Build a pool and register every configured chain
    pub fn from_config(config: &RpcConfig) -> Result<Self, String> {
        let pool = Self::with_options(
            config.mode,
            PoolOptions {
                budget: None,
                breaker: CircuitBreakerConfig::from_rpc_config(config),
                shuffle_endpoints: config.shuffle_endpoints,
            },
        )?;
        for (chain, urls) in &config.chains {
            pool.add_chain(chain, urls);
        }
        Ok(pool)
    }

    pub fn mode(&self) -> RpcMode {
        self.mode
    }

    pub fn budget(&self) -> ModeBudget {
        self.budget
    }

    /// Register or replace a chain's endpoint list
    pub fn add_chain<S: AsRef<str>>(&self, chain: &str, urls: &[S]) {
        let mut endpoints: Vec<Arc<RpcEndpoint>> = urls
            .iter()
            .map(|url| url.as_ref().trim())
            .filter(|url| !url.is_empty())
            .map(|url| Arc::new(RpcEndpoint::new(url, DEFAULT_ENDPOINT_WEIGHT, self.breaker_config)))
            .collect();

        if self.shuffle_endpoints {
            endpoints.shuffle(&mut rand::thread_rng());
        }

        if endpoints.is_empty() {
            logger::warning(
                LogTag::RpcPool,
                &format!("Chain '{}' registered without endpoints", chain),
            );
        } else {
            logger::info(
                LogTag::RpcPool,
                &format!("Chain '{}' registered with {} endpoints", chain, endpoints.len()),
            );
        }

        self.chains
            .write()
            .insert(chain.to_string(), Arc::new(endpoints));
    }

    /// Registered chain names, sorted
    pub fn chains(&self) -> Vec<String> {
        let mut names: Vec<String> = self.chains.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Endpoint list for a chain in registration order
    pub fn endpoints(&self, chain: &str) -> Option<EndpointList> {
        self.chains.read().get(chain).cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.client.read().is_none()
    }

    pub async fn json_rpc(
        &self,
        chain: &str,
        method: &str,
        params: Vec<Value>,
        request_id: Option<&str>,
    ) -> RpcResult<Value> {
        self.json_rpc_with_headers(chain, method, params, request_id, &[])
            .await
    }

    /// Like [`json_rpc`](Self::json_rpc), adding `extra_headers` to every attempt
    pub async fn json_rpc_with_headers(
        &self,
        chain: &str,
        method: &str,
        params: Vec<Value>,
        request_id: Option<&str>,
        extra_headers: &[(&str, &str)],
    ) -> RpcResult<Value> {
        if method.trim().is_empty() {
            return Err(RpcPoolError::InvalidRequest(
                "method must be a non-empty string".to_string(),
            ));
        }

        let client = self.client.read().clone().ok_or(RpcPoolError::PoolClosed)?;
        let endpoints = self
            .endpoints(chain)
            .filter(|list| !list.is_empty())
            .ok_or_else(|| RpcPoolError::UnknownChain {
                chain: chain.to_string(),
            })?;

        let request_id = request_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": method,
            "params": params,
        });

        let mut attempts = 0usize;
        let mut last_error: Option<String> = None;

        for endpoint in rank_endpoints(&endpoints)
            .into_iter()
            .take(self.budget.max_providers_per_call)
        {
            let breaker = endpoint.breaker();
            if !breaker.can_call() {
                logger::debug(
                    LogTag::RpcPool,
                    &format!("[{}] skipping {} (breaker {})", request_id, endpoint.url(), breaker.state()),
                );
                continue;
            }
            if breaker.state() == CircuitState::HalfOpen {
                breaker.record_probe_attempt();
            }

            let mut attempt = 0u32;
            loop {
                attempts += 1;
                let outcome = self
                    .attempt(&client, &endpoint, &payload, &request_id, extra_headers)
                    .await;

                match next_step(&outcome, attempt, &self.budget, endpoint.is_open()) {
                    RetryStep::Done => {
                        if let AttemptOutcome::Success(result) = outcome {
                            return Ok(result);
                        }
                        break;
                    }
                    RetryStep::Retry => {
                        last_error = outcome.error_text();
                        attempt += 1;
                        tokio::time::sleep(backoff_delay()).await;
                    }
                    RetryStep::NextEndpoint => {
                        last_error = outcome.error_text();
                        break;
                    }
                }
            }
        }

        let last_error =
            last_error.unwrap_or_else(|| "no eligible endpoint (all circuits open)".to_string());
        logger::error(
            LogTag::RpcPool,
            &format!(
                "[{}] {} on '{}' failed after {} attempts: {}",
                request_id, method, chain, attempts, last_error
            ),
        );

        Err(RpcPoolError::AllEndpointsFailed {
            chain: chain.to_string(),
            method: method.to_string(),
            attempts,
            last_error,
        })
    }

    /// One HTTP attempt, recorded against the endpoint before returning
    async fn attempt(
        &self,
        client: &reqwest::Client,
        endpoint: &RpcEndpoint,
        payload: &Value,
        request_id: &str,
        extra_headers: &[(&str, &str)],
    ) -> AttemptOutcome {
        let started = Instant::now();

        let mut request = client
            .post(endpoint.url())
            .timeout(self.budget.request_timeout())
            .header("X-Request-ID", request_id)
            .json(payload);
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }

        let outcome = match request.send().await {
            Err(e) => AttemptOutcome::failure(FailureKind::Transport, e.to_string()),
            Ok(response) if response.status() != reqwest::StatusCode::OK => {
                let status = response.status();
                AttemptOutcome::failure(
                    FailureKind::HttpStatus(status.as_u16()),
                    status.canonical_reason().unwrap_or("unexpected status"),
                )
            }
            Ok(response) => match response.json::<Value>().await {
                Ok(body) => classify_body(body),
                Err(e) if e.is_timeout() => {
                    AttemptOutcome::failure(FailureKind::Transport, e.to_string())
                }
                Err(e) => AttemptOutcome::failure(FailureKind::Decode, e.to_string()),
            },
        };

        match outcome.error_text() {
            None => {
                let latency = started.elapsed();
                endpoint.mark_success(latency);
                if is_debug_rpc_pool_enabled() {
                    logger::debug(
                        LogTag::RpcPool,
                        &format!("[{}] {} ok in {:?}", request_id, endpoint.url(), latency),
                    );
                }
            }
            Some(error) => {
                endpoint.mark_failure(&error);
                logger::debug(
                    LogTag::RpcPool,
                    &format!("[{}] {} failed: {}", request_id, endpoint.url(), error),
                );
            }
        }

        outcome
    }

    pub fn health(&self) -> PoolHealth {
        let chains: BTreeMap<String, _> = self
            .chains
            .read()
            .iter()
            .map(|(name, endpoints)| (name.clone(), chain_health(endpoints)))
            .collect();

        PoolHealth {
            mode: self.mode,
            closed: self.is_closed(),
            chains,
        }
    }

    /// Release the shared HTTP client; later calls fail with `PoolClosed`
    pub async fn close(&self) {
        match self.client.write().take() {
            Some(_) => logger::info(LogTag::RpcPool, "RPC pool closed"),
            None => logger::debug(LogTag::RpcPool, "RPC pool already closed"),
        }
    }
}

impl std::fmt::Debug for RpcPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcPool")
            .field("mode", &self.mode)
            .field("chains", &self.chains())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Stable sort by `RpcEndpoint::rank_key`; ties keep registration order
fn rank_endpoints(endpoints: &[Arc<RpcEndpoint>]) -> Vec<Arc<RpcEndpoint>> {
    let mut keyed: Vec<_> = endpoints
        .iter()
        .map(|ep| (ep.rank_key(), Arc::clone(ep)))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        a.0.cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    keyed.into_iter().map(|(_, ep)| ep).collect()
}
