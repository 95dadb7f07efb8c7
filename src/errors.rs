//! Error taxonomy for a creation run
//!
//! Every error is terminal for the run. Nothing in here is retried
//! internally; the category and context are enough for a caller to decide
//! whether to start a new run.

use thiserror::Error;

use crate::funding::FundingError;
use crate::metadata::MetadataStoreError;
use crate::observability::LogLine;
use crate::orchestrator::CreationState;
use crate::rpc_manager::RpcManagerError;
use crate::tx_builder::{StepKind, TransactionBuilderError};
use crate::types::AuthorityKind;
use crate::wallet::AddressCodecError;

/// Malformed input, caught before any network access
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field {field} must be a non-negative integer, got '{value}'")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Decimals must be between 0 and 9, got {value}")]
    DecimalsOutOfRange { value: i64 },

    #[error("Supply {supply} with {decimals} decimals overflows the base-unit amount")]
    SupplyOverflow { supply: u64, decimals: u8 },

    #[error("Field {field} is too long ({actual} bytes, max {max})")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("Unknown network '{0}' (expected devnet or mainnet-beta)")]
    UnknownNetwork(String),

    #[error("Field {field} is not an http(s) URL: '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Icon image is required")]
    MissingIcon,

    #[error("Invalid payer key: {0}")]
    InvalidKey(#[source] AddressCodecError),

    #[error("Invalid {authority} authority target: {source}")]
    InvalidAuthorityTarget {
        authority: AuthorityKind,
        #[source]
        source: AddressCodecError,
    },

    #[error("Unknown {authority} authority mode '{mode}' (expected keep, revoke or transfer)")]
    UnknownAuthorityMode { authority: AuthorityKind, mode: String },

    #[error("The {authority} authority cannot be transferred to the payer itself")]
    TransferToPayer { authority: AuthorityKind },
}

/// Terminal failure cause of a run
#[derive(Debug, Error)]
pub enum CreationError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Every candidate endpoint failed its liveness probe
    #[error("Connectivity error: {0}")]
    Connectivity(#[source] RpcManagerError),

    #[error("Funding error: {0}")]
    Funding(#[source] FundingError),

    /// A mutating ledger call did not confirm
    #[error("Ledger operation '{step}' (step {index}) failed: {cause}")]
    LedgerOperation {
        step: StepKind,
        index: usize,
        #[source]
        cause: TransactionBuilderError,
    },

    #[error("Metadata upload failed: {0}")]
    MetadataUpload(#[from] MetadataStoreError),

    /// A read-only query failed (e.g. rent lookup)
    #[error("RPC query failed: {0}")]
    Rpc(#[source] RpcManagerError),

    /// Plan construction rejected its own output
    #[error("Plan construction failed: {0}")]
    Plan(#[source] TransactionBuilderError),
}

impl CreationError {
    /// Stable label for logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Connectivity(_) => "connectivity",
            Self::Funding(_) => "funding",
            Self::LedgerOperation { .. } => "ledger_operation",
            Self::MetadataUpload(_) => "metadata_upload",
            Self::Rpc(_) => "rpc",
            Self::Plan(_) => "plan",
        }
    }

    /// Whether a fresh run could plausibly get past this failure
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connectivity(e) | Self::Rpc(e) => e.is_retryable(),
            Self::MetadataUpload(e) => e.is_retryable(),
            Self::LedgerOperation { cause, .. } => matches!(
                cause,
                TransactionBuilderError::Blockhash(_)
            ) || matches!(cause, TransactionBuilderError::Submission(e) if e.is_retryable()),
            _ => false,
        }
    }

    /// Whether anything may already have landed on-chain when this was raised
    pub fn may_have_partial_state(&self) -> bool {
        matches!(
            self,
            Self::LedgerOperation { .. } | Self::MetadataUpload(_) | Self::Plan(_)
        )
    }
}

impl From<FundingError> for CreationError {
    fn from(err: FundingError) -> Self {
        match err {
            FundingError::Rpc(rpc) => CreationError::Rpc(rpc),
            other => CreationError::Funding(other),
        }
    }
}

/// A failed run: where it stopped, why, and everything logged until then
#[derive(Debug, Error)]
#[error("Token creation failed while {state}: {error}")]
pub struct CreationFailure {
    pub state: CreationState,
    #[source]
    pub error: CreationError,
    pub log: Vec<LogLine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::UploadStage;

    #[test]
    fn test_error_display() {
        let err = ValidationError::DecimalsOutOfRange { value: 12 };
        assert_eq!(err.to_string(), "Decimals must be between 0 and 9, got 12");

        let err = CreationError::Validation(ValidationError::MissingIcon);
        assert_eq!(err.to_string(), "Validation error: Icon image is required");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            CreationError::Validation(ValidationError::MissingIcon).category(),
            "validation"
        );
        assert_eq!(
            CreationError::Connectivity(RpcManagerError::NoEndpointAvailable {
                attempted: vec![]
            })
            .category(),
            "connectivity"
        );
        let funding = CreationError::from(FundingError::InsufficientFunds {
            required: 10,
            available: 4,
            shortfall: 6,
        });
        assert_eq!(funding.category(), "funding");
        assert!(!funding.may_have_partial_state());
        assert!(!funding.is_retryable());
    }

    #[test]
    fn test_funding_rpc_error_maps_to_rpc() {
        let err = CreationError::from(FundingError::Rpc(RpcManagerError::Timeout {
            endpoint: "http://localhost:8899".to_string(),
            timeout_ms: 10,
        }));
        assert!(matches!(err, CreationError::Rpc(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_permanent_upload_rejection_is_not_retryable() {
        let too_large = CreationError::MetadataUpload(MetadataStoreError::Status {
            stage: UploadStage::Image,
            status: 413,
            body: "payload too large".to_string(),
        });
        assert!(too_large.may_have_partial_state());
        assert!(!too_large.is_retryable());

        let too_long =
            CreationError::MetadataUpload(MetadataStoreError::UriTooLong { len: 250, max: 200 });
        assert!(!too_long.is_retryable());

        let unavailable = CreationError::MetadataUpload(MetadataStoreError::Status {
            stage: UploadStage::Document,
            status: 503,
            body: String::new(),
        });
        assert!(unavailable.is_retryable());
    }
}
