//! Per-attempt outcomes and the retry policy over them
//!
//! The pool turns every HTTP attempt into an [`AttemptOutcome`] and asks
//! [`next_step`] what to do next, so the policy is testable without a network.

use rand::Rng;
use serde_json::Value;
use std::time::Duration;

use super::types::ModeBudget;

/// Backoff window between attempts on the same endpoint
pub const BACKOFF_MIN_MS: u64 = 50;
pub const BACKOFF_MAX_MS: u64 = 150;

#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// Non-200 response
    HttpStatus(u16),
    /// HTTP 200 carrying a JSON-RPC `error` member
    JsonRpc,
    /// Timeout, refused connection, DNS and other transport failures
    Transport,
    /// Body was not a JSON object
    Decode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(Value),
    Failure { kind: FailureKind, detail: String },
}

impl AttemptOutcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        AttemptOutcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success(_))
    }

    /// Text recorded as the endpoint's last error
    pub fn error_text(&self) -> Option<String> {
        match self {
            AttemptOutcome::Success(_) => None,
            AttemptOutcome::Failure { kind, detail } => Some(match kind {
                FailureKind::HttpStatus(code) => format!("HTTP {}: {}", code, detail),
                FailureKind::JsonRpc => format!("JSON-RPC error: {}", detail),
                FailureKind::Transport => format!("transport error: {}", detail),
                FailureKind::Decode => format!("invalid response: {}", detail),
            }),
        }
    }
}

/// Classify a decoded HTTP 200 body
pub fn classify_body(body: Value) -> AttemptOutcome {
    let Value::Object(mut map) = body else {
        return AttemptOutcome::failure(FailureKind::Decode, "response body is not a JSON object");
    };

    match map.remove("error") {
        Some(Value::Null) | None => {
            AttemptOutcome::Success(map.remove("result").unwrap_or(Value::Null))
        }
        Some(error) => {
            let detail = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            AttemptOutcome::failure(FailureKind::JsonRpc, detail)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Return the successful result
    Done,
    /// Back off, then try the same endpoint again
    Retry,
    /// Give up on this endpoint for the rest of the call
    NextEndpoint,
}

/// Decide what follows attempt number `attempt` (0-based) on one endpoint
///
/// `breaker_open` reports whether the endpoint's breaker tripped open; an open
/// endpoint gets no further attempts in the same call.
pub fn next_step(
    outcome: &AttemptOutcome,
    attempt: u32,
    budget: &ModeBudget,
    breaker_open: bool,
) -> RetryStep {
    if outcome.is_success() {
        return RetryStep::Done;
    }
    if breaker_open || attempt + 1 >= budget.attempts_per_endpoint() {
        return RetryStep::NextEndpoint;
    }
    RetryStep::Retry
}

pub fn backoff_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(BACKOFF_MIN_MS..=BACKOFF_MAX_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::types::RpcMode;
    use serde_json::json;

    fn fail() -> AttemptOutcome {
        AttemptOutcome::failure(FailureKind::HttpStatus(500), "Internal Server Error")
    }

    /// Attempts one endpoint would receive for a scripted outcome sequence
    fn attempts_used(outcomes: &[AttemptOutcome], budget: &ModeBudget) -> (usize, RetryStep) {
        for (i, outcome) in outcomes.iter().enumerate() {
            match next_step(outcome, i as u32, budget, false) {
                RetryStep::Retry => continue,
                step => return (i + 1, step),
            }
        }
        (outcomes.len(), RetryStep::NextEndpoint)
    }

    #[test]
    fn test_success_stops_immediately() {
        let budget = RpcMode::Free.budget();
        let outcomes = [fail(), AttemptOutcome::Success(json!("0x1")), fail()];
        assert_eq!(attempts_used(&outcomes, &budget), (2, RetryStep::Done));
    }

    #[test]
    fn test_failures_capped_by_mode() {
        let endless = vec![fail(); 10];
        assert_eq!(
            attempts_used(&endless, &RpcMode::Free.budget()),
            (3, RetryStep::NextEndpoint)
        );
        assert_eq!(
            attempts_used(&endless, &RpcMode::Pro.budget()),
            (2, RetryStep::NextEndpoint)
        );
    }

    #[test]
    fn test_open_breaker_abandons_endpoint() {
        let budget = RpcMode::Free.budget();
        assert_eq!(next_step(&fail(), 0, &budget, true), RetryStep::NextEndpoint);
    }

    #[test]
    fn test_classify_result_and_errors() {
        assert_eq!(
            classify_body(json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"})),
            AttemptOutcome::Success(json!("0x10"))
        );
        assert_eq!(
            classify_body(json!({"jsonrpc": "2.0", "id": 1})),
            AttemptOutcome::Success(Value::Null)
        );

        let rpc_error = classify_body(json!({"error": {"code": -32000, "message": "header not found"}}));
        assert_eq!(
            rpc_error,
            AttemptOutcome::failure(FailureKind::JsonRpc, "header not found")
        );
        assert_eq!(
            rpc_error.error_text().as_deref(),
            Some("JSON-RPC error: header not found")
        );

        assert!(matches!(
            classify_body(json!([1, 2])),
            AttemptOutcome::Failure {
                kind: FailureKind::Decode,
                ..
            }
        ));
    }

    #[test]
    fn test_backoff_within_window() {
        for _ in 0..50 {
            let delay = backoff_delay();
            assert!(delay >= Duration::from_millis(BACKOFF_MIN_MS));
            assert!(delay <= Duration::from_millis(BACKOFF_MAX_MS));
        }
    }
}
