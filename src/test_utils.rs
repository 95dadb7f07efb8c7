//! Test Utilities Module
//!
//! Hand-written doubles for the ledger, the endpoint connector and the
//! metadata store, plus builders for forms and requests. No network access.
//!
//! These utilities are only compiled when running tests or when the
//! `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::Transaction,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::metadata::{
    MetadataStore, MetadataStoreError, OffChainMetadata, UploadReceipt, UploadStage,
};
use crate::rpc_manager::{ConnectionEndpoint, LedgerRpc, RpcConnector, RpcManagerError};
use crate::types::{AuthorityInput, CreationRequest, IconImage, Network, TokenForm};

/// Metadata URI used by plan tests
pub const DEMO_URI: &str = "https://store.example/meta/demo.json";

/// Rent for an 82-byte account at the current mainnet rate
pub const MOCK_MINT_RENT: u64 = 1_461_600;

/// Scripted ledger: every call is counted, failures are opt-in
pub struct MockLedgerRpc {
    url: String,
    dead_probe: bool,
    probe_delay: Option<Duration>,
    rent_exemption: u64,
    balance: u64,
    failing_balance: bool,
    failing_blockhash: bool,
    failing_submit_at: Option<usize>,

    probes: AtomicUsize,
    blockhashes: AtomicUsize,
    queries: AtomicUsize,
    submitted: Mutex<Vec<Transaction>>,
}

impl MockLedgerRpc {
    /// Live endpoint with 10 SOL available
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            dead_probe: false,
            probe_delay: None,
            rent_exemption: MOCK_MINT_RENT,
            balance: 10_000_000_000,
            failing_balance: false,
            failing_blockhash: false,
            failing_submit_at: None,
            probes: AtomicUsize::new(0),
            blockhashes: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dead_probe(mut self) -> Self {
        self.dead_probe = true;
        self
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    pub fn with_rent_exemption(mut self, lamports: u64) -> Self {
        self.rent_exemption = lamports;
        self
    }

    pub fn with_balance(mut self, lamports: u64) -> Self {
        self.balance = lamports;
        self
    }

    pub fn with_failing_balance(mut self) -> Self {
        self.failing_balance = true;
        self
    }

    pub fn with_failing_blockhash(mut self) -> Self {
        self.failing_blockhash = true;
        self
    }

    /// Fail the submission with this zero-based position
    pub fn with_failing_submit_at(mut self, position: usize) -> Self {
        self.failing_submit_at = Some(position);
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn blockhash_count(&self) -> usize {
        self.blockhashes.load(Ordering::SeqCst)
    }

    /// Balance and rent queries
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Submissions attempted, failed ones included
    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().map(|txs| txs.len()).unwrap_or_default()
    }

    pub fn submitted_transactions(&self) -> Vec<Transaction> {
        self.submitted.lock().map(|txs| txs.clone()).unwrap_or_default()
    }

    pub fn submitted_blockhashes(&self) -> Vec<Hash> {
        self.submitted_transactions()
            .iter()
            .map(|tx| tx.message.recent_blockhash)
            .collect()
    }
}

#[async_trait]
impl LedgerRpc for MockLedgerRpc {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_block_height(&self) -> Result<u64, RpcManagerError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        if self.dead_probe {
            return Err(RpcManagerError::Transport {
                endpoint: self.url.clone(),
                message: "connection refused".to_string(),
            });
        }
        Ok(250_000_000)
    }

    async fn get_balance(&self, _address: &Pubkey) -> Result<u64, RpcManagerError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing_balance {
            return Err(RpcManagerError::RpcResponse {
                endpoint: self.url.clone(),
                message: "balance unavailable".to_string(),
                code: Some(-32005),
            });
        }
        Ok(self.balance)
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        _data_len: usize,
    ) -> Result<u64, RpcManagerError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.rent_exemption)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcManagerError> {
        self.blockhashes.fetch_add(1, Ordering::SeqCst);
        if self.failing_blockhash {
            return Err(RpcManagerError::BlockhashNotFound {
                endpoint: self.url.clone(),
            });
        }
        Ok(Hash::new_unique())
    }

    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, RpcManagerError> {
        let position = {
            let mut submitted = self
                .submitted
                .lock()
                .map_err(|e| RpcManagerError::Internal(e.to_string()))?;
            submitted.push(transaction.clone());
            submitted.len() - 1
        };

        if self.failing_submit_at == Some(position) {
            return Err(RpcManagerError::TransactionFailed {
                endpoint: self.url.clone(),
                message: format!("scripted failure at submission {}", position),
            });
        }
        transaction
            .signatures
            .first()
            .copied()
            .ok_or_else(|| RpcManagerError::Internal("unsigned transaction".to_string()))
    }
}

/// Connector over registered mocks; unknown URLs get a fresh live mock
#[derive(Default)]
pub struct MockConnector {
    rpcs: Mutex<HashMap<String, Arc<MockLedgerRpc>>>,
    connected: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, url: &str, rpc: MockLedgerRpc) -> Arc<MockLedgerRpc> {
        let rpc = Arc::new(rpc);
        if let Ok(mut rpcs) = self.rpcs.lock() {
            rpcs.insert(url.to_string(), rpc.clone());
        }
        rpc
    }

    pub fn rpc(&self, url: &str) -> Option<Arc<MockLedgerRpc>> {
        self.rpcs.lock().ok().and_then(|rpcs| rpcs.get(url).cloned())
    }

    /// URLs handed out, in connection order
    pub fn connected_urls(&self) -> Vec<String> {
        self.connected.lock().map(|urls| urls.clone()).unwrap_or_default()
    }

    /// Liveness probes across every mock
    pub fn probe_count(&self) -> usize {
        self.rpcs
            .lock()
            .map(|rpcs| rpcs.values().map(|rpc| rpc.probe_count()).sum())
            .unwrap_or_default()
    }
}

impl RpcConnector for MockConnector {
    fn connect(&self, url: &str, _commitment: CommitmentConfig) -> Arc<dyn LedgerRpc> {
        if let Ok(mut connected) = self.connected.lock() {
            connected.push(url.to_string());
        }
        let existing = self.rpc(url);
        match existing {
            Some(rpc) => rpc,
            None => self.register(url, MockLedgerRpc::new(url)),
        }
    }
}

/// Endpoint bound to a mock, skipping resolution
pub fn endpoint_for(rpc: Arc<MockLedgerRpc>) -> ConnectionEndpoint {
    ConnectionEndpoint {
        url: rpc.url().to_string(),
        network: Network::Devnet,
        commitment: CommitmentConfig::confirmed(),
        rpc,
    }
}

/// Store that hands out deterministic URLs
#[derive(Default)]
pub struct MockMetadataStore {
    failing: bool,
    uploads: AtomicUsize,
    called: AtomicBool,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn was_called(&self) -> bool {
        self.called.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for MockMetadataStore {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn upload(
        &self,
        metadata: &OffChainMetadata,
    ) -> Result<UploadReceipt, MetadataStoreError> {
        self.called.store(true, Ordering::SeqCst);
        if self.failing {
            return Err(MetadataStoreError::Status {
                stage: UploadStage::Image,
                status: 503,
                body: "store unavailable".to_string(),
            });
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let symbol = metadata.symbol.to_ascii_lowercase();
        Ok(UploadReceipt {
            url: format!("https://store.example/meta/{}.json", symbol),
            image_url: format!("https://store.example/img/{}", metadata.icon.file_name),
        })
    }
}

/// Base58 secret of a fresh keypair
pub fn payer_key() -> (Keypair, String) {
    let keypair = Keypair::new();
    let encoded = bs58::encode(keypair.to_bytes()).into_string();
    (keypair, encoded)
}

/// `keep`, `revoke` or `transfer:<address>`
pub fn authority_input(selection: &str) -> AuthorityInput {
    match selection.split_once(':') {
        Some(("transfer", target)) => AuthorityInput::transfer(target),
        _ => AuthorityInput {
            mode: selection.to_string(),
            target: String::new(),
        },
    }
}

/// Valid devnet form: Demo / DMO, 1 000 000 supply, 6 decimals
pub fn demo_form(payer_key: &str) -> TokenForm {
    TokenForm {
        network: "devnet".to_string(),
        custom_rpc_url: String::new(),
        payer_key: payer_key.to_string(),
        name: "Demo".to_string(),
        symbol: "DMO".to_string(),
        supply: "1000000".to_string(),
        decimals: "6".to_string(),
        description: "Demo token".to_string(),
        external_url: String::new(),
        icon: Some(IconImage::new("demo.png", "image/png", vec![0x89, b'P', b'N', b'G'])),
        mint_authority: AuthorityInput::keep(),
        freeze_authority: AuthorityInput::keep(),
        update_authority: AuthorityInput::keep(),
    }
}

/// Validated Demo request with the given authority selections
pub fn request_with(mint: &str, freeze: &str, update: &str) -> CreationRequest {
    let (_, key) = payer_key();
    let form = TokenForm {
        mint_authority: authority_input(mint),
        freeze_authority: authority_input(freeze),
        update_authority: authority_input(update),
        ..demo_form(&key)
    };
    match CreationRequest::from_form(&form) {
        Ok(request) => request,
        Err(e) => panic!("test form rejected: {e}"),
    }
}

