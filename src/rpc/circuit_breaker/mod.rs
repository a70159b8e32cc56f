//! Per-endpoint circuit breaker (Closed -> Open -> HalfOpen -> Closed)

mod config;
mod state;

pub use config::CircuitBreakerConfig;
pub use state::{CircuitBreaker, CircuitBreakerStatus};
