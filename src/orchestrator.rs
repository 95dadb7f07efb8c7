//! Creation orchestrator
//!
//! Drives one run through its states:
//!
//! ```text
//! Idle → Validating → ResolvingEndpoint → CheckingFunds → CreatingMint →
//! CreatingHoldingAccount → MintingSupply → UploadingMetadata → BuildingPlan →
//! ExecutingPlan → Succeeded
//! ```
//!
//! Any error moves the run to `Failed`. The failure records the state that
//! was active, the cause and the log accumulated so far. Nothing already
//! confirmed on-chain is undone.

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::errors::{CreationError, CreationFailure};
use crate::funding::FundingValidator;
use crate::metadata::{MetadataStore, OffChainMetadata};
use crate::metrics::{metrics, Timer};
use crate::observability::{ProgressSender, RunLog};
use crate::rpc_manager::{ConnectionEndpoint, EndpointResolver};
use crate::tx_builder::{
    build_plan, create_holding_account_step, create_mint_step, holding_account_address,
    metadata_address, mint_supply_step, planned_step_count, StepKind, TransactionBuilderError,
    TransactionExecutor, TransactionPlan, TransactionStep, DIRECT_STEP_COUNT,
};
use crate::types::{AuthorityStates, CreationRequest, CreationResult, TokenForm};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationState {
    Idle,
    Validating,
    ResolvingEndpoint,
    CheckingFunds,
    CreatingMint,
    CreatingHoldingAccount,
    MintingSupply,
    UploadingMetadata,
    BuildingPlan,
    ExecutingPlan,
    Succeeded,
    Failed,
}

impl CreationState {
    fn rank(&self) -> u8 {
        match self {
            CreationState::Idle => 0,
            CreationState::Validating => 1,
            CreationState::ResolvingEndpoint => 2,
            CreationState::CheckingFunds => 3,
            CreationState::CreatingMint => 4,
            CreationState::CreatingHoldingAccount => 5,
            CreationState::MintingSupply => 6,
            CreationState::UploadingMetadata => 7,
            CreationState::BuildingPlan => 8,
            CreationState::ExecutingPlan => 9,
            CreationState::Succeeded | CreationState::Failed => 10,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CreationState::Succeeded | CreationState::Failed)
    }

    /// Forward only. `Failed` is reachable from any non-terminal state,
    /// `Succeeded` only from `ExecutingPlan`.
    pub fn can_advance_to(&self, next: CreationState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            CreationState::Failed => true,
            CreationState::Succeeded => *self == CreationState::ExecutingPlan,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CreationState::Idle => "idle",
            CreationState::Validating => "validating",
            CreationState::ResolvingEndpoint => "resolving endpoint",
            CreationState::CheckingFunds => "checking funds",
            CreationState::CreatingMint => "creating mint",
            CreationState::CreatingHoldingAccount => "creating holding account",
            CreationState::MintingSupply => "minting supply",
            CreationState::UploadingMetadata => "uploading metadata",
            CreationState::BuildingPlan => "building plan",
            CreationState::ExecutingPlan => "executing plan",
            CreationState::Succeeded => "succeeded",
            CreationState::Failed => "failed",
        }
    }
}

impl fmt::Display for CreationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequences validation, connectivity, funding, ledger steps and metadata
/// publication for one token at a time
pub struct CreationOrchestrator {
    resolver: EndpointResolver,
    funding: FundingValidator,
    executor: TransactionExecutor,
    store: Arc<dyn MetadataStore>,
    events: Option<ProgressSender>,
}

impl CreationOrchestrator {
    pub fn new(
        resolver: EndpointResolver,
        funding: FundingValidator,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            resolver,
            funding,
            executor: TransactionExecutor::new(),
            store,
            events: None,
        }
    }

    /// Push state changes and log lines of every run to `events`
    pub fn with_progress(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate a form, then create the token
    pub async fn run(&self, form: &TokenForm) -> Result<CreationResult, CreationFailure> {
        let mut log = RunLog::new(self.events.clone());
        let span = info_span!("creation_run", correlation_id = %log.correlation_id());

        async {
            metrics().runs_started.inc();
            let timer = Timer::new();

            advance(&mut log, CreationState::Validating);
            let outcome = match CreationRequest::from_form(form) {
                Ok(request) => {
                    log.info(format!(
                        "Validated {} ({}) on {}",
                        request.token().name,
                        request.token().symbol,
                        request.network()
                    ));
                    self.drive(&request, &mut log).await
                }
                Err(e) => {
                    log.error(format!("Validation failed: {}", e));
                    Err(CreationError::Validation(e))
                }
            };
            finish(outcome, log, &timer)
        }
        .instrument(span)
        .await
    }

    /// Create a token from an already validated request
    pub async fn create_token(
        &self,
        request: &CreationRequest,
    ) -> Result<CreationResult, CreationFailure> {
        let mut log = RunLog::new(self.events.clone());
        let span = info_span!("creation_run", correlation_id = %log.correlation_id());

        async {
            metrics().runs_started.inc();
            let timer = Timer::new();
            let outcome = self.drive(request, &mut log).await;
            finish(outcome, log, &timer)
        }
        .instrument(span)
        .await
    }

    /// Post-mint plan for a placeholder mint. No network access.
    pub fn preview(
        &self,
        request: &CreationRequest,
    ) -> Result<TransactionPlan, TransactionBuilderError> {
        let mint = Pubkey::default();
        build_plan(request, &mint, &metadata_address(&mint), "pending://metadata")
    }

    async fn drive(
        &self,
        request: &CreationRequest,
        log: &mut RunLog,
    ) -> Result<CreationResult, CreationError> {
        let payer = request.payer().keypair();
        let payer_key = payer.pubkey();
        let token = request.token();

        advance(log, CreationState::ResolvingEndpoint);
        let endpoint = self
            .resolver
            .resolve(request.custom_endpoint(), request.network(), log)
            .await
            .map_err(CreationError::Connectivity)?;

        advance(log, CreationState::CheckingFunds);
        let step_count = planned_step_count(request.authorities());
        let funding = self
            .funding
            .check_funding(&endpoint, &payer_key, step_count, log)
            .await?;

        advance(log, CreationState::CreatingMint);
        let mint_keypair = Keypair::new();
        let mint = mint_keypair.pubkey();
        let mut signatures = Vec::with_capacity(step_count);

        let kind = StepKind::CreateMint {
            decimals: token.decimals,
        };
        let step = create_mint_step(&payer_key, &mint, token.decimals, funding.rent_exemption)
            .map_err(|cause| ledger_error(kind, 0, cause))?;
        signatures.push(
            self.submit_direct(&endpoint, 0, &step, &[payer, &mint_keypair], log)
                .await?,
        );
        log.info(format!("Mint created: {}", mint));

        advance(log, CreationState::CreatingHoldingAccount);
        let holding_account = holding_account_address(&payer_key, &mint);
        let step = create_holding_account_step(&payer_key, &mint);
        signatures.push(self.submit_direct(&endpoint, 1, &step, &[payer], log).await?);
        log.info(format!("Holding account ready: {}", holding_account));

        advance(log, CreationState::MintingSupply);
        let amount = token.base_unit_supply();
        let step = mint_supply_step(&payer_key, &mint, &holding_account, amount)
            .map_err(|cause| ledger_error(StepKind::MintSupply { amount }, 2, cause))?;
        signatures.push(self.submit_direct(&endpoint, 2, &step, &[payer], log).await?);
        log.info(format!(
            "Minted {} {} ({} base units)",
            token.supply, token.symbol, amount
        ));

        advance(log, CreationState::UploadingMetadata);
        let receipt = self
            .store
            .upload(&OffChainMetadata::from_request(request))
            .await?;
        log.info(format!(
            "Metadata published via {} store: {}",
            self.store.name(),
            receipt.url
        ));

        advance(log, CreationState::BuildingPlan);
        let metadata_account = metadata_address(&mint);
        let plan = build_plan(request, &mint, &metadata_account, &receipt.url)
            .map_err(CreationError::Plan)?;
        let kinds: Vec<String> = plan.kinds().iter().map(ToString::to_string).collect();
        log.info(format!("Plan: {}", kinds.join(" → ")));

        advance(log, CreationState::ExecutingPlan);
        let plan_signatures = self
            .executor
            .execute(&endpoint, &plan, DIRECT_STEP_COUNT, &[payer], log)
            .await
            .map_err(|e| match e {
                TransactionBuilderError::StepFailed { index, step, cause } => {
                    ledger_error(step, index, *cause)
                }
                other => CreationError::Plan(other),
            })?;
        signatures.extend(plan_signatures);

        let result = CreationResult {
            mint,
            holding_account,
            metadata_account,
            metadata_uri: receipt.url,
            signatures,
            network: endpoint.network,
            endpoint: endpoint.url.clone(),
            authorities: AuthorityStates::from_directives(request.authorities(), payer_key),
        };

        advance(log, CreationState::Succeeded);
        log.info(format!(
            "Token {} created with {} transaction(s): {}",
            token.symbol,
            result.signatures.len(),
            result.mint_explorer_url()
        ));
        Ok(result)
    }

    async fn submit_direct(
        &self,
        endpoint: &ConnectionEndpoint,
        index: usize,
        step: &TransactionStep,
        signers: &[&dyn Signer],
        log: &mut RunLog,
    ) -> Result<solana_sdk::signature::Signature, CreationError> {
        self.executor
            .submit_step(endpoint, index, step, signers, log)
            .await
            .map_err(|cause| ledger_error(step.kind, index, cause))
    }
}

fn ledger_error(step: StepKind, index: usize, cause: TransactionBuilderError) -> CreationError {
    CreationError::LedgerOperation { step, index, cause }
}

fn advance(log: &mut RunLog, to: CreationState) {
    debug_assert!(
        log.state().can_advance_to(to),
        "illegal transition {} -> {}",
        log.state(),
        to
    );
    log.enter(to);
}

fn finish(
    outcome: Result<CreationResult, CreationError>,
    mut log: RunLog,
    timer: &Timer,
) -> Result<CreationResult, CreationFailure> {
    timer.observe_duration(&metrics().run_latency);

    match outcome {
        Ok(result) => {
            metrics().runs_succeeded.inc();
            log.logger()
                .log_run_finished(true, Some(&result.mint.to_string()), timer.elapsed_ms());
            info!(mint = %result.mint, uri = %result.metadata_uri, "Token created");
            Ok(result)
        }
        Err(error) => {
            let state = log.state();
            metrics()
                .runs_failed
                .with_label_values(&[error.category()])
                .inc();
            advance(&mut log, CreationState::Failed);
            log.error(format!("Run failed while {}: {}", state, error));
            if error.may_have_partial_state() {
                log.warn("Earlier steps may already be confirmed on-chain and are not undone");
            }
            if error.is_retryable() {
                log.info("The failure looks transient; a new run may succeed");
            }
            log.logger()
                .log_run_finished(false, None, timer.elapsed_ms());
            Err(CreationFailure {
                state,
                error,
                log: log.into_lines(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funding::FundingPolicy;
    use crate::observability::ProgressEvent;
    use crate::rpc_manager::{RpcConfig, RpcManagerError};
    use crate::test_utils::{demo_form, payer_key, MockConnector, MockLedgerRpc, MockMetadataStore};
    use crate::types::{AuthorityInput, AuthorityState};
    use tokio::sync::mpsc;

    const URL: &str = "http://mock";

    struct Harness {
        connector: Arc<MockConnector>,
        rpc: Arc<MockLedgerRpc>,
        store: Arc<MockMetadataStore>,
        orchestrator: CreationOrchestrator,
    }

    fn harness(rpc: MockLedgerRpc, store: MockMetadataStore) -> Harness {
        let connector = Arc::new(MockConnector::new());
        let rpc = connector.register(URL, rpc);
        let store = Arc::new(store);
        let config = RpcConfig {
            devnet_endpoints: vec![URL.to_string()],
            ..RpcConfig::default()
        };
        let orchestrator = CreationOrchestrator::new(
            EndpointResolver::new(config, connector.clone()),
            FundingValidator::new(FundingPolicy::default()),
            store.clone(),
        );
        Harness {
            connector,
            rpc,
            store,
            orchestrator,
        }
    }

    #[test]
    fn test_state_machine_is_forward_only() {
        use CreationState::*;
        assert!(Idle.can_advance_to(Validating));
        assert!(Idle.can_advance_to(ResolvingEndpoint));
        assert!(CheckingFunds.can_advance_to(CreatingMint));
        assert!(MintingSupply.can_advance_to(Failed));
        assert!(ExecutingPlan.can_advance_to(Succeeded));

        assert!(!CreatingMint.can_advance_to(CheckingFunds));
        assert!(!BuildingPlan.can_advance_to(BuildingPlan));
        assert!(!MintingSupply.can_advance_to(Succeeded));
        assert!(!Succeeded.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Validating));
    }

    #[tokio::test]
    async fn test_invalid_decimals_fail_without_rpc() {
        let h = harness(MockLedgerRpc::new(URL), MockMetadataStore::new());
        let (_, key) = payer_key();
        let form = TokenForm {
            decimals: "12".to_string(),
            ..demo_form(&key)
        };

        let failure = h.orchestrator.run(&form).await.unwrap_err();

        assert_eq!(failure.state, CreationState::Validating);
        assert_eq!(failure.error.category(), "validation");
        assert!(h.connector.connected_urls().is_empty());
        assert_eq!(h.rpc.probe_count(), 0);
        assert_eq!(h.rpc.submitted_count(), 0);
        assert!(!h.store.was_called());
        assert!(failure.log.iter().any(|line| line.message.contains("Decimals")));
    }

    #[tokio::test]
    async fn test_demo_run_end_to_end() {
        let h = harness(MockLedgerRpc::new(URL), MockMetadataStore::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orchestrator = h.orchestrator.with_progress(tx);

        let (payer, key) = payer_key();
        let target = Pubkey::new_unique();
        let form = TokenForm {
            freeze_authority: AuthorityInput::revoke(),
            update_authority: AuthorityInput::transfer(target.to_string()),
            ..demo_form(&key)
        };

        let result = orchestrator.run(&form).await.unwrap();

        // 3 direct steps + create-metadata, set-freeze, update-authority
        assert_eq!(result.signatures.len(), 6);
        assert_eq!(h.rpc.submitted_count(), 6);
        assert_eq!(h.rpc.blockhash_count(), 6);
        assert_eq!(h.store.upload_count(), 1);
        assert_eq!(result.metadata_uri, "https://store.example/meta/dmo.json");
        assert_eq!(result.endpoint, URL);
        assert_eq!(result.holding_account, holding_account_address(&payer.pubkey(), &result.mint));
        assert_eq!(result.metadata_account, metadata_address(&result.mint));
        assert_eq!(result.authorities.mint, AuthorityState::Payer(payer.pubkey()));
        assert_eq!(result.authorities.freeze, AuthorityState::Revoked);
        assert_eq!(result.authorities.update, AuthorityState::Transferred(target));
        assert!(result.authorities.metadata_mutable);

        // create-mint is co-signed by the mint keypair
        let txs = h.rpc.submitted_transactions();
        assert_eq!(txs[0].signatures.len(), 2);
        assert_eq!(txs[0].message.account_keys[0], payer.pubkey());

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::StateChanged { to, .. } = event {
                states.push(to);
            }
        }
        assert_eq!(
            states,
            vec![
                CreationState::Validating,
                CreationState::ResolvingEndpoint,
                CreationState::CheckingFunds,
                CreationState::CreatingMint,
                CreationState::CreatingHoldingAccount,
                CreationState::MintingSupply,
                CreationState::UploadingMetadata,
                CreationState::BuildingPlan,
                CreationState::ExecutingPlan,
                CreationState::Succeeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_insufficient_funds_stops_before_any_submission() {
        let h = harness(
            MockLedgerRpc::new(URL).with_balance(1_000),
            MockMetadataStore::new(),
        );
        let (_, key) = payer_key();
        let request = CreationRequest::from_form(&demo_form(&key)).unwrap();

        let failure = h.orchestrator.create_token(&request).await.unwrap_err();

        assert_eq!(failure.state, CreationState::CheckingFunds);
        assert_eq!(failure.error.category(), "funding");
        assert_eq!(h.rpc.submitted_count(), 0);
        assert!(!failure.log.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_after_minting() {
        let h = harness(MockLedgerRpc::new(URL), MockMetadataStore::failing());
        let (_, key) = payer_key();
        let request = CreationRequest::from_form(&demo_form(&key)).unwrap();

        let failure = h.orchestrator.create_token(&request).await.unwrap_err();

        assert_eq!(failure.state, CreationState::UploadingMetadata);
        assert_eq!(failure.error.category(), "metadata_upload");
        assert!(failure.error.may_have_partial_state());
        assert_eq!(h.rpc.submitted_count(), DIRECT_STEP_COUNT);
    }

    #[tokio::test]
    async fn test_plan_failure_carries_step_and_log() {
        // Fails create-metadata, the fourth submission
        let h = harness(
            MockLedgerRpc::new(URL).with_failing_submit_at(3),
            MockMetadataStore::new(),
        );
        let (_, key) = payer_key();
        let form = TokenForm {
            mint_authority: AuthorityInput::revoke(),
            ..demo_form(&key)
        };

        let failure = h.orchestrator.run(&form).await.unwrap_err();

        assert_eq!(failure.state, CreationState::ExecutingPlan);
        match &failure.error {
            CreationError::LedgerOperation { step, index, .. } => {
                assert_eq!(*index, 3);
                assert_eq!(*step, StepKind::CreateMetadata { is_mutable: true });
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.rpc.submitted_count(), 4);
        let last = failure.log.last().unwrap();
        assert_eq!(last.state, CreationState::Failed);
    }

    #[tokio::test]
    async fn test_direct_step_failure_halts_before_upload() {
        // Fails create-holding-account, the second submission
        let h = harness(
            MockLedgerRpc::new(URL).with_failing_submit_at(1),
            MockMetadataStore::new(),
        );
        let (_, key) = payer_key();
        let request = CreationRequest::from_form(&demo_form(&key)).unwrap();

        let failure = h.orchestrator.create_token(&request).await.unwrap_err();

        assert_eq!(failure.state, CreationState::CreatingHoldingAccount);
        match &failure.error {
            CreationError::LedgerOperation { step, index, .. } => {
                assert_eq!(*index, 1);
                assert_eq!(*step, StepKind::CreateHoldingAccount);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(failure.error.may_have_partial_state());
        assert_eq!(h.rpc.submitted_count(), 2);
        assert_eq!(h.store.upload_count(), 0);
        assert_eq!(failure.log.last().unwrap().state, CreationState::Failed);
    }

    #[tokio::test]
    async fn test_no_live_endpoint_fails_before_funding_check() {
        let h = harness(
            MockLedgerRpc::new(URL).with_dead_probe(),
            MockMetadataStore::new(),
        );
        let (_, key) = payer_key();
        let request = CreationRequest::from_form(&demo_form(&key)).unwrap();

        let failure = h.orchestrator.create_token(&request).await.unwrap_err();

        assert_eq!(failure.state, CreationState::ResolvingEndpoint);
        match &failure.error {
            CreationError::Connectivity(RpcManagerError::NoEndpointAvailable { attempted }) => {
                assert_eq!(attempted, &vec![URL.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!failure.error.may_have_partial_state());
        assert_eq!(h.rpc.probe_count(), 1);
        assert_eq!(h.rpc.query_count(), 0);
        assert_eq!(h.rpc.submitted_count(), 0);
        assert!(!h.store.was_called());
    }

    #[tokio::test]
    async fn test_preview_touches_no_network() {
        let h = harness(MockLedgerRpc::new(URL), MockMetadataStore::new());
        let (_, key) = payer_key();
        let form = TokenForm {
            mint_authority: AuthorityInput::revoke(),
            freeze_authority: AuthorityInput::revoke(),
            update_authority: AuthorityInput::revoke(),
            ..demo_form(&key)
        };
        let request = CreationRequest::from_form(&form).unwrap();

        let plan = h.orchestrator.preview(&request).unwrap();

        assert_eq!(plan.len(), 4);
        assert!(h.connector.connected_urls().is_empty());
    }
}
