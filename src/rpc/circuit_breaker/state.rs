//! Circuit breaker state machine

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use super::config::CircuitBreakerConfig;
use crate::arguments::is_debug_breaker_enabled;
use crate::logger::{self, LogTag};
use crate::rpc::types::CircuitState;

/// Internal phase; the half-open probe slot lives inside the variant so a
/// second probe cannot be granted while one is outstanding
///
/// `probe_since` is when the outstanding probe was granted. A probe whose
/// caller vanished without reporting back is reclaimed after `open_duration`.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: u32 },
    Open { until: Instant, failures: u32 },
    HalfOpen { probe_since: Option<Instant>, successes: u32 },
}

/// Circuit breaker guarding a single endpoint
///
/// All methods are synchronous and never fail; the lock is never held across
/// an await point.
pub struct CircuitBreaker {
    /// Endpoint label used in logs
    name: String,
    config: CircuitBreakerConfig,
    phase: Mutex<Phase>,
    /// Times this breaker has tripped open
    total_opens: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
            total_opens: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(name: &str) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Whether a call may be sent now
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open and grants
    /// the probe to this caller; every other caller sees `false` until the
    /// probe resolves or goes unanswered for a full cooldown.
    pub fn can_call(&self) -> bool {
        let mut phase = self.phase.lock();
        let now = Instant::now();
        match *phase {
            Phase::Closed { .. } => true,
            Phase::HalfOpen {
                probe_since,
                successes,
            } => match probe_since {
                Some(since) if now < since + self.config.open_duration => false,
                stale => {
                    if stale.is_some() {
                        logger::warning(
                            LogTag::CircuitBreaker,
                            &format!("{} probe never reported back, granting a new one", self.name),
                        );
                    }
                    *phase = Phase::HalfOpen {
                        probe_since: Some(now),
                        successes,
                    };
                    true
                }
            },
            Phase::Open { until, .. } => {
                if now >= until {
                    *phase = Phase::HalfOpen {
                        probe_since: Some(now),
                        successes: 0,
                    };
                    logger::debug(
                        LogTag::CircuitBreaker,
                        &format!("{} half-open, probe granted", self.name),
                    );
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Mark the half-open probe as dispatched
    pub fn record_probe_attempt(&self) {
        let mut phase = self.phase.lock();
        if let Phase::HalfOpen {
            probe_since,
            successes,
        } = *phase
        {
            *phase = Phase::HalfOpen {
                probe_since: probe_since.or(Some(Instant::now())),
                successes,
            };
        }
    }

    pub fn on_success(&self) {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Closed { .. } => *phase = Phase::Closed { failures: 0 },
            Phase::HalfOpen { successes, .. } => {
                let successes = successes + 1;
                if successes >= self.config.success_threshold {
                    *phase = Phase::Closed { failures: 0 };
                    logger::info(
                        LogTag::CircuitBreaker,
                        &format!("{} recovered, circuit closed", self.name),
                    );
                } else {
                    *phase = Phase::HalfOpen {
                        probe_since: None,
                        successes,
                    };
                }
            }
            // A call admitted before the breaker tripped; the cooldown stands
            Phase::Open { .. } => {}
        }
    }

    pub fn on_failure(&self) {
        let mut phase = self.phase.lock();
        let now = Instant::now();
        match *phase {
            Phase::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    *phase = Phase::Open {
                        until: now + self.config.open_duration,
                        failures,
                    };
                    self.total_opens.fetch_add(1, Ordering::Relaxed);
                    logger::warning(
                        LogTag::CircuitBreaker,
                        &format!(
                            "{} circuit opened after {} consecutive failures (cooldown {:?})",
                            self.name, failures, self.config.open_duration
                        ),
                    );
                } else {
                    *phase = Phase::Closed { failures };
                    if is_debug_breaker_enabled() {
                        logger::debug(
                            LogTag::CircuitBreaker,
                            &format!(
                                "{} failure {}/{}",
                                self.name, failures, self.config.failure_threshold
                            ),
                        );
                    }
                }
            }
            Phase::HalfOpen { .. } => {
                *phase = Phase::Open {
                    until: now + self.config.open_duration,
                    failures: self.config.failure_threshold,
                };
                self.total_opens.fetch_add(1, Ordering::Relaxed);
                logger::warning(
                    LogTag::CircuitBreaker,
                    &format!("{} probe failed, circuit re-opened", self.name),
                );
            }
            Phase::Open { failures, .. } => {
                *phase = Phase::Open {
                    until: now + self.config.open_duration,
                    failures: failures.saturating_add(1),
                };
            }
        }
    }

    /// Current state; never transitions
    pub fn state(&self) -> CircuitState {
        match *self.phase.lock() {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_count(&self) -> u32 {
        match *self.phase.lock() {
            Phase::Closed { failures } | Phase::Open { failures, .. } => failures,
            Phase::HalfOpen { .. } => 0,
        }
    }

    pub fn total_opens(&self) -> u64 {
        self.total_opens.load(Ordering::Relaxed)
    }

    /// Remaining cooldown while open
    pub fn time_until_retry(&self) -> Option<Duration> {
        match *self.phase.lock() {
            Phase::Open { until, .. } => Some(until.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        CircuitBreakerStatus {
            name: self.name.clone(),
            state: self.state(),
            failure_count: self.failure_count(),
            total_opens: self.total_opens(),
            retry_in_ms: self.time_until_retry().map(|d| d.as_millis() as u64),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("phase", &*self.phase.lock())
            .field("total_opens", &self.total_opens())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub total_opens: u64,
    pub retry_in_ms: Option<u64>,
}
