//! Funding sufficiency check
//!
//! `required = rent(mint account) + fee_per_transaction * steps + fixed_buffer`.
//! Rent is queried live; fee and buffer are fixed estimates because real fee
//! introspection needs the finished transactions. Runs before any mutating
//! ledger call.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use thiserror::Error;
use tracing::debug;

use crate::observability::RunLog;
use crate::rpc_manager::{ConnectionEndpoint, RpcManagerError};

/// Byte size of an SPL mint account
pub const MINT_ACCOUNT_SIZE: usize = spl_token::state::Mint::LEN;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Fixed parts of the funding estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingPolicy {
    /// Conservative per-transaction fee in lamports
    #[serde(default = "default_fee_per_transaction")]
    pub fee_per_transaction: u64,

    /// Covers the holding-account and metadata-account rent
    #[serde(default = "default_fixed_buffer")]
    pub fixed_buffer: u64,
}

fn default_fee_per_transaction() -> u64 {
    10_000
}

fn default_fixed_buffer() -> u64 {
    10_000_000
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            fee_per_transaction: default_fee_per_transaction(),
            fixed_buffer: default_fixed_buffer(),
        }
    }
}

impl FundingPolicy {
    /// `rent + fee * steps + buffer`, saturating
    pub fn required_lamports(&self, rent_exemption: u64, planned_step_count: usize) -> u64 {
        rent_exemption
            .saturating_add(
                self.fee_per_transaction
                    .saturating_mul(planned_step_count as u64),
            )
            .saturating_add(self.fixed_buffer)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FundingError {
    #[error(
        "Insufficient funds: required {required} lamports, available {available} (short by {shortfall})"
    )]
    InsufficientFunds {
        required: u64,
        available: u64,
        shortfall: u64,
    },

    #[error("Funding query failed: {0}")]
    Rpc(#[from] RpcManagerError),
}

/// Breakdown of a passed funding check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingReport {
    pub rent_exemption: u64,
    pub estimated_fees: u64,
    pub buffer: u64,
    pub required: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Default)]
pub struct FundingValidator {
    policy: FundingPolicy,
}

impl FundingValidator {
    pub fn new(policy: FundingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FundingPolicy {
        &self.policy
    }

    /// Compare the payer's balance with the estimate for `planned_step_count` transactions
    pub async fn check_funding(
        &self,
        endpoint: &ConnectionEndpoint,
        payer: &Pubkey,
        planned_step_count: usize,
        log: &mut RunLog,
    ) -> Result<FundingReport, FundingError> {
        let rent_exemption = endpoint
            .rpc
            .get_minimum_balance_for_rent_exemption(MINT_ACCOUNT_SIZE)
            .await?;
        let available = endpoint.rpc.get_balance(payer).await?;

        let estimated_fees = self
            .policy
            .fee_per_transaction
            .saturating_mul(planned_step_count as u64);
        let required = self
            .policy
            .required_lamports(rent_exemption, planned_step_count);

        debug!(
            payer = %payer,
            rent_exemption,
            estimated_fees,
            buffer = self.policy.fixed_buffer,
            required,
            available,
            "Funding check"
        );

        if available < required {
            let shortfall = required - available;
            log.error(format!(
                "Balance {:.6} SOL is below the required {:.6} SOL (short by {:.6} SOL)",
                available as f64 / LAMPORTS_PER_SOL,
                required as f64 / LAMPORTS_PER_SOL,
                shortfall as f64 / LAMPORTS_PER_SOL
            ));
            return Err(FundingError::InsufficientFunds {
                required,
                available,
                shortfall,
            });
        }

        log.info(format!(
            "Balance {:.6} SOL covers the required {:.6} SOL for {} transaction(s)",
            available as f64 / LAMPORTS_PER_SOL,
            required as f64 / LAMPORTS_PER_SOL,
            planned_step_count
        ));

        Ok(FundingReport {
            rent_exemption,
            estimated_fees,
            buffer: self.policy.fixed_buffer,
            required,
            available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{endpoint_for, MockLedgerRpc};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_mint_account_size() {
        assert_eq!(MINT_ACCOUNT_SIZE, 82);
    }

    #[test]
    fn test_required_formula() {
        let policy = FundingPolicy {
            fee_per_transaction: 5_000,
            fixed_buffer: 1_000_000,
        };
        assert_eq!(policy.required_lamports(1_461_600, 7), 1_461_600 + 35_000 + 1_000_000);
        assert_eq!(policy.required_lamports(u64::MAX, 7), u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_required_is_rent_plus_fees_plus_buffer(
            rent in 0u64..10_000_000_000,
            fee in 0u64..1_000_000,
            buffer in 0u64..1_000_000_000,
            steps in 0usize..32,
        ) {
            let policy = FundingPolicy { fee_per_transaction: fee, fixed_buffer: buffer };
            prop_assert_eq!(
                policy.required_lamports(rent, steps),
                rent + fee * steps as u64 + buffer
            );
        }
    }

    #[tokio::test]
    async fn test_balance_below_required_fails() {
        let rpc = Arc::new(
            MockLedgerRpc::new("http://mock")
                .with_rent_exemption(1_000)
                .with_balance(1_000 + 100 * 4 + 50 - 1),
        );
        let endpoint = endpoint_for(rpc.clone());
        let validator = FundingValidator::new(FundingPolicy {
            fee_per_transaction: 100,
            fixed_buffer: 50,
        });
        let mut log = RunLog::new(None);

        let err = validator
            .check_funding(&endpoint, &Pubkey::new_unique(), 4, &mut log)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FundingError::InsufficientFunds {
                required: 1_450,
                available: 1_449,
                shortfall: 1,
            }
        );
        assert_eq!(rpc.submitted_count(), 0);
    }

    #[tokio::test]
    async fn test_balance_equal_to_required_passes() {
        let rpc = Arc::new(
            MockLedgerRpc::new("http://mock")
                .with_rent_exemption(1_000)
                .with_balance(1_450),
        );
        let endpoint = endpoint_for(rpc);
        let validator = FundingValidator::new(FundingPolicy {
            fee_per_transaction: 100,
            fixed_buffer: 50,
        });
        let mut log = RunLog::new(None);

        let report = validator
            .check_funding(&endpoint, &Pubkey::new_unique(), 4, &mut log)
            .await
            .unwrap();
        assert_eq!(report.required, 1_450);
        assert_eq!(report.estimated_fees, 400);
        assert_eq!(report.rent_exemption, 1_000);
    }

    #[tokio::test]
    async fn test_rpc_failure_is_reported() {
        let rpc = Arc::new(MockLedgerRpc::new("http://mock").with_failing_balance());
        let endpoint = endpoint_for(rpc);
        let validator = FundingValidator::default();
        let mut log = RunLog::new(None);

        let err = validator
            .check_funding(&endpoint, &Pubkey::new_unique(), 4, &mut log)
            .await
            .unwrap_err();
        assert!(matches!(err, FundingError::Rpc(_)));
    }
}
