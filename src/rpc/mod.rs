//! Multi-chain JSON-RPC connection pool
//!
//! - `circuit_breaker`: per-endpoint Closed/Open/HalfOpen gate
//! - `endpoint`: one upstream URL with latency and failure statistics
//! - `retry`: tagged attempt outcomes and the pure retry policy
//! - `pool`: ranked selection, bounded retries, request correlation
//! - `health`: per-chain aggregation for monitoring

pub mod circuit_breaker;
pub mod endpoint;
pub mod health;
pub mod pool;
pub mod retry;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use endpoint::RpcEndpoint;
pub use pool::{PoolOptions, RpcPool};
pub use types::{ChainHealth, CircuitState, EndpointHealth, ModeBudget, PoolHealth, RpcMode};
