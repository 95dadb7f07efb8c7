//! Transaction step construction and plan building
//!
//! Every ledger mutation of a run is one `TransactionStep`. The first three
//! (create-mint, create-holding-account, mint-to) are built here but
//! submitted directly by the orchestrator; the rest form the
//! `TransactionPlan`, whose parameters only exist once the mint does.
//!
//! Plan order is fixed:
//! 1. create-metadata (always; immutable iff the update authority is revoked)
//! 2. set-mint-authority, unless kept
//! 3. set-freeze-authority, unless kept
//! 4. update-metadata-authority, unless kept
//!
//! Metadata must exist before any authority that references it changes, and
//! the mint authority must still be the payer when metadata is created.
//! Among the authority steps there is no on-chain dependency; declaration
//! order is kept for auditability.

use mpl_token_metadata::{
    accounts::Metadata,
    instructions::{CreateMetadataAccountV3Builder, UpdateMetadataAccountV2Builder},
    types::DataV2,
};
use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use spl_token::instruction::AuthorityType;
use std::fmt;

use crate::funding::MINT_ACCOUNT_SIZE;
use crate::tx_builder::errors::TransactionBuilderError;
use crate::types::{
    AuthorityDirective, AuthorityDirectives, AuthorityKind, CreationRequest, MAX_URI_LENGTH,
};

/// Steps submitted directly before the plan: create-mint, create-holding-account, mint-to
pub const DIRECT_STEP_COUNT: usize = 3;

/// What one transaction step does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    CreateMint { decimals: u8 },
    CreateHoldingAccount,
    MintSupply { amount: u64 },
    CreateMetadata { is_mutable: bool },
    SetMintAuthority { new_authority: Option<Pubkey> },
    SetFreezeAuthority { new_authority: Option<Pubkey> },
    UpdateMetadataAuthority {
        new_authority: Option<Pubkey>,
        is_mutable: bool,
    },
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::CreateMint { .. } => "create-mint",
            StepKind::CreateHoldingAccount => "create-holding-account",
            StepKind::MintSupply { .. } => "mint-to",
            StepKind::CreateMetadata { .. } => "create-metadata",
            StepKind::SetMintAuthority { .. } => "set-mint-authority",
            StepKind::SetFreezeAuthority { .. } => "set-freeze-authority",
            StepKind::UpdateMetadataAuthority { .. } => "update-metadata-authority",
        }
    }

    /// Authority this step changes, if any
    pub fn authority(&self) -> Option<AuthorityKind> {
        match self {
            StepKind::SetMintAuthority { .. } => Some(AuthorityKind::Mint),
            StepKind::SetFreezeAuthority { .. } => Some(AuthorityKind::Freeze),
            StepKind::UpdateMetadataAuthority { .. } => Some(AuthorityKind::Update),
            _ => None,
        }
    }

    fn is_direct(&self) -> bool {
        matches!(
            self,
            StepKind::CreateMint { .. }
                | StepKind::CreateHoldingAccount
                | StepKind::MintSupply { .. }
        )
    }
}

fn authority_label(authority: &Option<Pubkey>) -> String {
    authority
        .map(|key| key.to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn mutability_label(is_mutable: bool) -> &'static str {
    if is_mutable {
        "mutable"
    } else {
        "immutable"
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::CreateMint { decimals } => {
                write!(f, "{}({} decimals)", self.label(), decimals)
            }
            StepKind::CreateHoldingAccount => f.write_str(self.label()),
            StepKind::MintSupply { amount } => write!(f, "{}({})", self.label(), amount),
            StepKind::CreateMetadata { is_mutable } => {
                write!(f, "{}({})", self.label(), mutability_label(*is_mutable))
            }
            StepKind::SetMintAuthority { new_authority }
            | StepKind::SetFreezeAuthority { new_authority } => {
                write!(f, "{}({})", self.label(), authority_label(new_authority))
            }
            StepKind::UpdateMetadataAuthority {
                new_authority,
                is_mutable,
            } => write!(
                f,
                "{}({}, {})",
                self.label(),
                authority_label(new_authority),
                mutability_label(*is_mutable)
            ),
        }
    }
}

/// One atomic ledger operation, submitted as one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStep {
    pub kind: StepKind,
    pub instructions: Vec<Instruction>,
}

impl TransactionStep {
    pub fn new(kind: StepKind, instructions: Vec<Instruction>) -> Self {
        Self { kind, instructions }
    }
}

/// Ordered steps to run after the mint exists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPlan {
    steps: Vec<TransactionStep>,
}

impl TransactionPlan {
    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|step| step.kind).collect()
    }
}

/// Metaplex metadata PDA of a mint
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Metadata::find_pda(mint).0
}

/// Associated token account of `owner` for `mint`
pub fn holding_account_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address(owner, mint)
}

/// Transactions a run will submit: the direct steps, metadata creation,
/// and one step per authority that is not kept
pub fn planned_step_count(directives: &AuthorityDirectives) -> usize {
    let changes = directives
        .iter()
        .filter(|(_, directive)| !directive.is_keep())
        .count();
    DIRECT_STEP_COUNT + 1 + changes
}

/// Allocate and initialise the mint. Freeze authority always starts as the
/// payer so that a later revoke or transfer has something to change.
pub fn create_mint_step(
    payer: &Pubkey,
    mint: &Pubkey,
    decimals: u8,
    rent_lamports: u64,
) -> Result<TransactionStep, TransactionBuilderError> {
    let create_account = system_instruction::create_account(
        payer,
        mint,
        rent_lamports,
        MINT_ACCOUNT_SIZE as u64,
        &spl_token::id(),
    );
    let initialize = spl_token::instruction::initialize_mint2(
        &spl_token::id(),
        mint,
        payer,
        Some(payer),
        decimals,
    )
    .map_err(|e| TransactionBuilderError::instruction_failed("spl-token", e))?;

    Ok(TransactionStep::new(
        StepKind::CreateMint { decimals },
        vec![create_account, initialize],
    ))
}

/// Create the payer's holding account, or accept it if it already exists
pub fn create_holding_account_step(payer: &Pubkey, mint: &Pubkey) -> TransactionStep {
    TransactionStep::new(
        StepKind::CreateHoldingAccount,
        vec![create_associated_token_account_idempotent(
            payer,
            payer,
            mint,
            &spl_token::id(),
        )],
    )
}

/// Mint the initial supply (in base units) into the holding account
pub fn mint_supply_step(
    payer: &Pubkey,
    mint: &Pubkey,
    holding_account: &Pubkey,
    amount: u64,
) -> Result<TransactionStep, TransactionBuilderError> {
    let mint_to = spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        holding_account,
        payer,
        &[],
        amount,
    )
    .map_err(|e| TransactionBuilderError::instruction_failed("spl-token", e))?;

    Ok(TransactionStep::new(StepKind::MintSupply { amount }, vec![mint_to]))
}

/// Build the post-mint plan. Pure: no network, no hidden state.
pub fn build_plan(
    request: &CreationRequest,
    mint: &Pubkey,
    metadata_pda: &Pubkey,
    metadata_uri: &str,
) -> Result<TransactionPlan, TransactionBuilderError> {
    if metadata_uri.len() > MAX_URI_LENGTH {
        return Err(TransactionBuilderError::instruction_failed(
            "mpl-token-metadata",
            format!(
                "metadata URI is {} bytes, max {}",
                metadata_uri.len(),
                MAX_URI_LENGTH
            ),
        ));
    }

    let payer = request.payer().pubkey();
    let directives = request.authorities();
    let is_mutable = directives.metadata_is_mutable();

    let mut steps = Vec::with_capacity(1 + AuthorityKind::ALL.len());

    let token = request.token();
    let data = DataV2 {
        name: token.name.clone(),
        symbol: token.symbol.clone(),
        uri: metadata_uri.to_string(),
        seller_fee_basis_points: 0,
        creators: None,
        collection: None,
        uses: None,
    };
    let create_metadata = CreateMetadataAccountV3Builder::new()
        .metadata(*metadata_pda)
        .mint(*mint)
        .mint_authority(payer)
        .payer(payer)
        .update_authority(payer, true)
        .data(data)
        .is_mutable(is_mutable)
        .instruction();
    steps.push(TransactionStep::new(
        StepKind::CreateMetadata { is_mutable },
        vec![create_metadata],
    ));

    for (kind, directive) in directives.iter() {
        let step = authority_step(kind, directive, &payer, mint, metadata_pda, is_mutable)?;
        if let Some(step) = step {
            steps.push(step);
        }
    }

    let plan = TransactionPlan { steps };

    #[cfg(debug_assertions)]
    sanity_check_plan_order(&plan)?;

    Ok(plan)
}

/// One step for one authority directive; `None` when the authority is kept
fn authority_step(
    kind: AuthorityKind,
    directive: &AuthorityDirective,
    payer: &Pubkey,
    mint: &Pubkey,
    metadata_pda: &Pubkey,
    is_mutable: bool,
) -> Result<Option<TransactionStep>, TransactionBuilderError> {
    let Some(new_authority) = directive.change() else {
        return Ok(None);
    };

    let step = match kind {
        AuthorityKind::Mint => TransactionStep::new(
            StepKind::SetMintAuthority { new_authority },
            vec![set_token_authority(
                mint,
                payer,
                new_authority.as_ref(),
                AuthorityType::MintTokens,
            )?],
        ),
        AuthorityKind::Freeze => TransactionStep::new(
            StepKind::SetFreezeAuthority { new_authority },
            vec![set_token_authority(
                mint,
                payer,
                new_authority.as_ref(),
                AuthorityType::FreezeAccount,
            )?],
        ),
        AuthorityKind::Update => {
            let mut builder = UpdateMetadataAccountV2Builder::new();
            builder.metadata(*metadata_pda).update_authority(*payer);
            match new_authority {
                Some(target) => {
                    builder.new_update_authority(target);
                }
                None => {
                    // Metaplex has no empty update authority; the all-zero
                    // address has no private key, so nobody can sign for it
                    builder.new_update_authority(Pubkey::default()).is_mutable(false);
                }
            }
            TransactionStep::new(
                StepKind::UpdateMetadataAuthority {
                    new_authority,
                    is_mutable: is_mutable && new_authority.is_some(),
                },
                vec![builder.instruction()],
            )
        }
    };

    Ok(Some(step))
}

fn set_token_authority(
    mint: &Pubkey,
    current: &Pubkey,
    new_authority: Option<&Pubkey>,
    authority_type: AuthorityType,
) -> Result<Instruction, TransactionBuilderError> {
    spl_token::instruction::set_authority(
        &spl_token::id(),
        mint,
        new_authority,
        authority_type,
        current,
        &[],
    )
    .map_err(|e| TransactionBuilderError::instruction_failed("spl-token", e))
}

/// Validate plan ordering. `build_plan` runs it on its own output in debug builds.
///
/// Metadata creation must come first and exactly once, direct steps never
/// appear in a plan, and authority steps follow mint, freeze, update order
/// with each authority changed at most once.
pub fn sanity_check_plan_order(plan: &TransactionPlan) -> Result<(), TransactionBuilderError> {
    let Some(first) = plan.steps.first() else {
        return Err(TransactionBuilderError::invalid_order("plan is empty"));
    };
    if !matches!(first.kind, StepKind::CreateMetadata { .. }) {
        return Err(TransactionBuilderError::invalid_order(format!(
            "plan must start with create-metadata, found {}",
            first.kind
        )));
    }

    let mut last_authority: Option<usize> = None;
    for step in &plan.steps[1..] {
        if step.kind.is_direct() || matches!(step.kind, StepKind::CreateMetadata { .. }) {
            return Err(TransactionBuilderError::invalid_order(format!(
                "{} is not allowed after create-metadata",
                step.kind
            )));
        }
        let position = step
            .kind
            .authority()
            .and_then(|kind| AuthorityKind::ALL.iter().position(|k| *k == kind))
            .ok_or_else(|| TransactionBuilderError::invalid_order("unknown plan step"))?;
        if last_authority.is_some_and(|last| position <= last) {
            return Err(TransactionBuilderError::invalid_order(format!(
                "{} is out of order or duplicated",
                step.kind
            )));
        }
        last_authority = Some(position);
    }

    Ok(())
}
