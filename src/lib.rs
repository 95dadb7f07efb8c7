//! mintforge - Solana token creation library
//!
//! Validates a token form, finds a live RPC endpoint, checks the payer's
//! balance, creates the mint, holding account and initial supply, publishes
//! metadata, and applies the requested authority changes in a fixed order.

pub mod config;
pub mod errors;
pub mod funding;
pub mod metadata;
pub mod metrics;
pub mod observability;
pub mod orchestrator;
pub mod structured_logging;
pub mod tx_builder;
pub mod types;
pub mod wallet;

// Component modules with non-standard paths (directories with spaces)
#[path = "rpc manager/mod.rs"]
pub mod rpc_manager;

pub mod test_utils;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use errors::{CreationError, CreationFailure, ValidationError};
pub use orchestrator::{CreationOrchestrator, CreationState};
pub use types::{CreationRequest, CreationResult, TokenForm};
