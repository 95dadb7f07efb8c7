//! Execution context for one transaction step
//!
//! Holds the blockhash fetched for this step and the fee payer. A context
//! lives for exactly one submission; the next step fetches a fresh blockhash
//! and gets a new context.

use solana_sdk::{
    hash::Hash, instruction::Instruction, pubkey::Pubkey, signer::Signer, transaction::Transaction,
};

use super::errors::TransactionBuilderError;
use super::instructions::StepKind;

/// State needed to assemble and sign one step
#[derive(Clone)]
pub struct ExecutionContext {
    /// Position of the step in the run's submission order
    pub index: usize,
    pub step: StepKind,
    pub blockhash: Hash,
    pub fee_payer: Pubkey,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("index", &self.index)
            .field("step", &self.step.to_string())
            .field("blockhash", &self.blockhash.to_string())
            .field("fee_payer", &self.fee_payer.to_string())
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(index: usize, step: StepKind, blockhash: Hash, fee_payer: Pubkey) -> Self {
        Self {
            index,
            step,
            blockhash,
            fee_payer,
        }
    }

    /// Build a legacy transaction paid by `fee_payer` and sign it with every
    /// signer the instructions require
    pub fn sign(
        &self,
        instructions: &[Instruction],
        signers: &[&dyn Signer],
    ) -> Result<Transaction, TransactionBuilderError> {
        if instructions.is_empty() {
            return Err(TransactionBuilderError::instruction_failed(
                self.step.label(),
                "step has no instructions",
            ));
        }

        let mut tx = Transaction::new_with_payer(instructions, Some(&self.fee_payer));
        tx.try_sign(signers, self.blockhash)
            .map_err(|e| TransactionBuilderError::Signing(format!("{}: {}", self.step, e)))?;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::signature::Keypair;
    use solana_sdk::system_instruction;

    #[test]
    fn test_sign_sets_blockhash_and_payer() {
        let payer = Keypair::new();
        let blockhash = Hash::new_unique();
        let ctx =
            ExecutionContext::new(0, StepKind::CreateHoldingAccount, blockhash, payer.pubkey());
        let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);

        let tx = ctx.sign(&[ix], &[&payer]).unwrap();
        assert_eq!(tx.message.recent_blockhash, blockhash);
        assert_eq!(tx.message.account_keys[0], payer.pubkey());
        assert!(tx.is_signed());
    }

    #[test]
    fn test_missing_signer_is_rejected() {
        let payer = Keypair::new();
        let mint = Keypair::new();
        let ctx = ExecutionContext::new(
            0,
            StepKind::CreateMint { decimals: 6 },
            Hash::new_unique(),
            payer.pubkey(),
        );
        let ix = system_instruction::create_account(
            &payer.pubkey(),
            &mint.pubkey(),
            1,
            82,
            &spl_token::id(),
        );

        let err = ctx.sign(&[ix], &[&payer]).unwrap_err();
        assert!(matches!(err, TransactionBuilderError::Signing(_)));
    }

    #[test]
    fn test_empty_step_is_rejected() {
        let payer = Keypair::new();
        let ctx = ExecutionContext::new(
            1,
            StepKind::CreateHoldingAccount,
            Hash::new_unique(),
            payer.pubkey(),
        );
        assert!(matches!(
            ctx.sign(&[], &[&payer]),
            Err(TransactionBuilderError::InstructionBuild { .. })
        ));
    }
}
