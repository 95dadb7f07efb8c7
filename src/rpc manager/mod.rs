//! RPC Manager Module
//!
//! Ledger access for a creation run: the `LedgerRpc` seam over the Solana
//! JSON-RPC API, connection factories, and endpoint resolution with ordered
//! failover.

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use std::sync::Arc;

// Submodules
pub mod rpc_client;
pub mod rpc_config;
pub mod rpc_errors;
pub mod rpc_pool;

// Re-exports for convenience
pub use rpc_client::{SolanaLedgerRpc, SolanaRpcConnector};
pub use rpc_config::RpcConfig;
pub use rpc_errors::RpcManagerError;
pub use rpc_pool::{
    ConnectionEndpoint, EndpointProber, EndpointResolver, OrderedFailover, ProbeOutcome,
    ResolutionStrategy,
};

/// Ledger operations the creation pipeline needs
///
/// Implementations make exactly one network call per method; there is no
/// internal retry.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// URL this handle is bound to
    fn url(&self) -> &str;

    async fn get_block_height(&self) -> Result<u64, RpcManagerError>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcManagerError>;

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, RpcManagerError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcManagerError>;

    /// Submit a signed transaction and wait for confirmation at the handle's commitment
    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, RpcManagerError>;
}

/// Opens ledger handles for candidate URLs
pub trait RpcConnector: Send + Sync {
    fn connect(&self, url: &str, commitment: CommitmentConfig) -> Arc<dyn LedgerRpc>;
}
