//! `LedgerRpc` over the non-blocking Solana RPC client

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::Transaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{LedgerRpc, RpcConnector, RpcManagerError};

/// A single RPC endpoint with a fixed commitment
pub struct SolanaLedgerRpc {
    url: String,
    commitment: CommitmentConfig,
    timeout: Duration,
    client: RpcClient,
}

impl SolanaLedgerRpc {
    pub fn new(url: &str, commitment: CommitmentConfig, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            commitment,
            timeout,
            client: RpcClient::new_with_timeout_and_commitment(
                url.to_string(),
                timeout,
                commitment,
            ),
        }
    }

    fn classify(&self, error: ClientError) -> RpcManagerError {
        RpcManagerError::from_client_error(&error, &self.url, self.timeout)
    }
}

impl std::fmt::Debug for SolanaLedgerRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaLedgerRpc")
            .field("url", &self.url)
            .field("commitment", &self.commitment.commitment)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LedgerRpc for SolanaLedgerRpc {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_block_height(&self) -> Result<u64, RpcManagerError> {
        self.client
            .get_block_height()
            .await
            .map_err(|e| self.classify(e))
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcManagerError> {
        self.client
            .get_balance(address)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, RpcManagerError> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        let (hash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| self.classify(e))?;
        debug!(url = %self.url, blockhash = %hash, last_valid_block_height, "Fetched blockhash");
        Ok(hash)
    }

    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, RpcManagerError> {
        self.client
            .send_and_confirm_transaction(transaction)
            .await
            .map_err(|e| self.classify(e))
    }
}

/// Creates `SolanaLedgerRpc` handles with a shared request timeout
#[derive(Debug, Clone)]
pub struct SolanaRpcConnector {
    timeout: Duration,
}

impl SolanaRpcConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl RpcConnector for SolanaRpcConnector {
    fn connect(&self, url: &str, commitment: CommitmentConfig) -> Arc<dyn LedgerRpc> {
        Arc::new(SolanaLedgerRpc::new(url, commitment, self.timeout))
    }
}
