//! Transaction building and execution
//!
//! - **instructions**: step construction and the pure post-mint plan builder
//! - **context**: per-step blockhash and signing
//! - **executor**: sequential submit-and-confirm with halt on first failure
//! - **errors**: error taxonomy shared by the above
//!
//! Plan building never touches the network, so every authority combination
//! can be checked without a ledger. Execution is strictly sequential: step
//! N+1 is signed only after step N confirmed.

pub mod errors;
pub use errors::TransactionBuilderError;

pub mod context;
pub mod executor;
pub mod instructions;

pub use context::ExecutionContext;
pub use executor::TransactionExecutor;
pub use instructions::{
    build_plan, create_holding_account_step, create_mint_step, holding_account_address,
    metadata_address, mint_supply_step, planned_step_count, sanity_check_plan_order, StepKind,
    TransactionPlan, TransactionStep, DIRECT_STEP_COUNT,
};
