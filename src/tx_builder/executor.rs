//! Sequential step submission
//!
//! Each step is signed with a blockhash fetched immediately before it and
//! submitted only after the previous step confirmed. The first failure halts
//! the plan; nothing is rolled back.

use solana_sdk::{signature::Signature, signer::Signer};
use std::time::Instant;
use tracing::{debug, instrument};

use super::context::ExecutionContext;
use super::errors::TransactionBuilderError;
use super::instructions::{TransactionPlan, TransactionStep};
use crate::metrics::metrics;
use crate::observability::RunLog;
use crate::rpc_manager::ConnectionEndpoint;

/// Submits transaction steps one at a time and waits for each to confirm
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionExecutor;

impl TransactionExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Sign, submit and confirm one step. `signers[0]` pays the fee.
    #[instrument(skip_all, fields(index = index, step = %step.kind))]
    pub async fn submit_step(
        &self,
        endpoint: &ConnectionEndpoint,
        index: usize,
        step: &TransactionStep,
        signers: &[&dyn Signer],
        log: &mut RunLog,
    ) -> Result<Signature, TransactionBuilderError> {
        let fee_payer = signers
            .first()
            .map(|signer| signer.pubkey())
            .ok_or_else(|| TransactionBuilderError::Signing("no fee payer".to_string()))?;

        let result = self
            .sign_and_send(endpoint, index, step, fee_payer, signers, log)
            .await;

        match &result {
            Ok(signature) => {
                metrics().steps_confirmed.inc();
                log.info(format!("Step {} {} confirmed: {}", index, step.kind, signature));
            }
            Err(e) => {
                metrics().steps_failed.inc();
                log.logger()
                    .log_step_failed(index, step.kind.label(), &e.to_string());
                log.error(format!("Step {} {} failed: {}", index, step.kind, e));
            }
        }
        result
    }

    async fn sign_and_send(
        &self,
        endpoint: &ConnectionEndpoint,
        index: usize,
        step: &TransactionStep,
        fee_payer: solana_sdk::pubkey::Pubkey,
        signers: &[&dyn Signer],
        log: &mut RunLog,
    ) -> Result<Signature, TransactionBuilderError> {
        let blockhash = endpoint
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(TransactionBuilderError::Blockhash)?;

        let ctx = ExecutionContext::new(index, step.kind, blockhash, fee_payer);
        let tx = ctx.sign(&step.instructions, signers)?;

        log.logger()
            .log_step_submitted(index, step.kind.label(), &blockhash.to_string());
        log.info(format!("Submitting step {} {}", index, step.kind));

        let started = Instant::now();
        let signature = endpoint
            .rpc
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(TransactionBuilderError::Submission)?;

        let latency = started.elapsed();
        metrics().step_latency.observe(latency.as_secs_f64());
        log.logger().log_step_confirmed(
            index,
            step.kind.label(),
            &signature.to_string(),
            latency.as_millis() as u64,
        );
        debug!(?ctx, %signature, "Step confirmed");

        Ok(signature)
    }

    /// Run a plan in order, numbering steps from `first_index`. Returns every
    /// confirmed signature, or the first failure wrapped with its position.
    pub async fn execute(
        &self,
        endpoint: &ConnectionEndpoint,
        plan: &TransactionPlan,
        first_index: usize,
        signers: &[&dyn Signer],
        log: &mut RunLog,
    ) -> Result<Vec<Signature>, TransactionBuilderError> {
        let mut signatures = Vec::with_capacity(plan.len());

        for (offset, step) in plan.steps().iter().enumerate() {
            let index = first_index + offset;
            let signature = self
                .submit_step(endpoint, index, step, signers, log)
                .await
                .map_err(|cause| TransactionBuilderError::StepFailed {
                    index,
                    step: step.kind,
                    cause: Box::new(cause),
                })?;
            signatures.push(signature);
        }

        Ok(signatures)
    }
}
