/// Error types shared across the RPC pool and the WebSocket hub
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// RPC POOL ERRORS
// =============================================================================

/// Errors surfaced to `RpcPool` callers
///
/// Per-attempt failures never reach the caller individually; they are folded
/// into [`RpcPoolError::AllEndpointsFailed`] once the call budget is spent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcPoolError {
    #[error("No RPC endpoints configured for chain '{chain}'")]
    UnknownChain { chain: String },

    #[error("Invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    #[error("RPC pool is closed")]
    PoolClosed,

    #[error("All RPC endpoints failed for chain '{chain}' method '{method}' after {attempts} attempts: {last_error}")]
    AllEndpointsFailed {
        chain: String,
        method: String,
        attempts: usize,
        last_error: String,
    },
}

impl RpcPoolError {
    /// Configuration errors fail fast; nothing was sent upstream
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RpcPoolError::UnknownChain { .. } | RpcPoolError::InvalidRequest(_)
        )
    }
}

pub type RpcResult<T> = std::result::Result<T, RpcPoolError>;

// =============================================================================
// SOCKET ERRORS
// =============================================================================

/// Failure delivering a frame to, or closing, a client socket
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SocketError {
    #[error("socket closed by peer")]
    Closed,

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("socket transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_error_names_chain_method_and_cause() {
        let err = RpcPoolError::AllEndpointsFailed {
            chain: "ethereum".to_string(),
            method: "eth_blockNumber".to_string(),
            attempts: 4,
            last_error: "HTTP 500".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("ethereum"));
        assert!(text.contains("eth_blockNumber"));
        assert!(text.contains("HTTP 500"));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_configuration_errors_classified() {
        let err = RpcPoolError::UnknownChain {
            chain: "base".to_string(),
        };
        assert!(err.is_configuration_error());
        assert!(RpcPoolError::InvalidRequest("empty method".into()).is_configuration_error());
    }
}
