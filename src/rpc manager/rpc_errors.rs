use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::rpc_request::RpcError;
use solana_sdk::transaction::TransactionError;
use std::time::Duration;
use thiserror::Error;

/// RPC layer error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcManagerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    /// Timeout errors
    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// RPC response errors (from the RPC server)
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// The transaction landed but failed, or was rejected before landing
    #[error("Transaction failed: {message} (endpoint: {endpoint})")]
    TransactionFailed { endpoint: String, message: String },

    /// Every candidate endpoint failed its probe
    #[error("No endpoint available (attempted: {})", attempted.join(", "))]
    NoEndpointAvailable { attempted: Vec<String> },

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcManagerError {
    /// Classify a Solana client error; `timeout` is the client's request timeout
    pub fn from_client_error(error: &ClientError, endpoint: &str, timeout: Duration) -> Self {
        let endpoint = endpoint.to_string();
        let timed_out = |endpoint| RpcManagerError::Timeout {
            endpoint,
            timeout_ms: timeout.as_millis() as u64,
        };
        match error.kind() {
            ClientErrorKind::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                timed_out(endpoint)
            }
            ClientErrorKind::Io(e) => RpcManagerError::Transport {
                endpoint,
                message: e.to_string(),
            },
            ClientErrorKind::Reqwest(e) => {
                if e.is_timeout() {
                    timed_out(endpoint)
                } else {
                    RpcManagerError::Transport {
                        endpoint,
                        message: e.to_string(),
                    }
                }
            }
            ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) => {
                Self::from_rpc_message(endpoint, message, Some(*code))
            }
            ClientErrorKind::RpcError(rpc_err) => {
                Self::from_rpc_message(endpoint, &rpc_err.to_string(), None)
            }
            ClientErrorKind::TransactionError(tx_err) => match tx_err {
                TransactionError::BlockhashNotFound => {
                    RpcManagerError::BlockhashNotFound { endpoint }
                }
                TransactionError::InsufficientFundsForFee
                | TransactionError::InsufficientFundsForRent { .. } => {
                    RpcManagerError::InsufficientFunds { endpoint }
                }
                other => RpcManagerError::TransactionFailed {
                    endpoint,
                    message: other.to_string(),
                },
            },
            _ => RpcManagerError::RpcResponse {
                endpoint,
                message: error.to_string(),
                code: None,
            },
        }
    }

    fn from_rpc_message(endpoint: String, message: &str, code: Option<i64>) -> Self {
        let lowered = message.to_lowercase();
        if lowered.contains("blockhash not found") {
            RpcManagerError::BlockhashNotFound { endpoint }
        } else if lowered.contains("insufficient funds")
            || lowered.contains("insufficient lamports")
        {
            RpcManagerError::InsufficientFunds { endpoint }
        } else if code == Some(-32002) {
            // Preflight simulation failed
            RpcManagerError::TransactionFailed {
                endpoint,
                message: message.to_string(),
            }
        } else {
            RpcManagerError::RpcResponse {
                endpoint,
                message: message.to_string(),
                code,
            }
        }
    }

    /// Check if a fresh run could plausibly succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcManagerError::Transport { .. } => true,
            RpcManagerError::Timeout { .. } => true,
            RpcManagerError::BlockhashNotFound { .. } => true,
            RpcManagerError::NoEndpointAvailable { .. } => true,
            RpcManagerError::RpcResponse { code, .. } => {
                // Node lag / unhealthy
                matches!(code, Some(-32004) | Some(-32005) | Some(-32014) | Some(-32016))
            }

            RpcManagerError::InsufficientFunds { .. } => false,
            RpcManagerError::TransactionFailed { .. } => false,
            RpcManagerError::Internal(_) => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            RpcManagerError::Transport { .. } => "transport",
            RpcManagerError::Timeout { .. } => "timeout",
            RpcManagerError::RpcResponse { .. } => "rpc_response",
            RpcManagerError::BlockhashNotFound { .. } => "blockhash",
            RpcManagerError::InsufficientFunds { .. } => "insufficient_funds",
            RpcManagerError::TransactionFailed { .. } => "transaction",
            RpcManagerError::NoEndpointAvailable { .. } => "no_endpoint",
            RpcManagerError::Internal(_) => "internal",
        }
    }
}
