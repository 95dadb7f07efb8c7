//! Error types for transaction building and execution

use thiserror::Error;

use super::instructions::StepKind;
use crate::rpc_manager::RpcManagerError;

/// Error type for building, signing and submitting transaction steps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// Failed to build an instruction for a specific program
    #[error("Instruction build error (program={program}): {reason}")]
    InstructionBuild {
        /// The program the instruction targets
        program: String,
        /// Detailed reason for the failure
        reason: String,
    },

    /// Plan violates its ordering rules
    #[error("Invalid plan order: {0}")]
    InvalidPlanOrder(String),

    /// Failed to fetch a recent blockhash for a step
    #[error("Blockhash error: {0}")]
    Blockhash(#[source] RpcManagerError),

    /// Failed to sign the transaction
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Submission or confirmation failed
    #[error("Submission failed: {0}")]
    Submission(#[source] RpcManagerError),

    /// A plan step failed; later steps were not attempted
    #[error("Step {index} ({step}) failed: {cause}")]
    StepFailed {
        index: usize,
        step: StepKind,
        #[source]
        cause: Box<TransactionBuilderError>,
    },
}

impl TransactionBuilderError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::InstructionBuild { .. } => "instruction",
            Self::InvalidPlanOrder(_) => "validation",
            Self::Blockhash(_) => "blockhash",
            Self::Signing(_) => "signing",
            Self::Submission(_) => "submission",
            Self::StepFailed { cause, .. } => cause.category(),
        }
    }

    /// Create an instruction build error for a specific program
    pub fn instruction_failed(program: impl Into<String>, reason: impl ToString) -> Self {
        Self::InstructionBuild {
            program: program.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid plan order error
    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidPlanOrder(reason.into())
    }
}
