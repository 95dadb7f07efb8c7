//! Common types used throughout the creation pipeline
//!
//! `TokenForm` is what a presentation layer collects (all strings).
//! `CreationRequest` is the only validated form of it and can only be built
//! by validating a whole form at once.

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::wallet::{parse_address, WalletManager};

/// Highest number of decimals accepted for a new mint
pub const MAX_DECIMALS: u8 = 9;
/// Metaplex limit for the on-chain name field
pub const MAX_NAME_LENGTH: usize = 32;
/// Metaplex limit for the on-chain symbol field
pub const MAX_SYMBOL_LENGTH: usize = 10;
/// Metaplex limit for the on-chain URI field
pub const MAX_URI_LENGTH: usize = 200;

/// Target cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Devnet,
    MainnetBeta,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::MainnetBeta => "mainnet-beta",
        }
    }

    /// Built-in public RPC endpoints, highest priority first
    pub fn public_rpc_urls(&self) -> &'static [&'static str] {
        match self {
            Network::Devnet => &[
                "https://api.devnet.solana.com",
                "https://rpc.ankr.com/solana_devnet",
            ],
            Network::MainnetBeta => &[
                "https://api.mainnet-beta.solana.com",
                "https://rpc.ankr.com/solana",
                "https://solana-rpc.publicnode.com",
            ],
        }
    }

    /// Explorer link for an address on this network
    pub fn explorer_address_url(&self, address: &Pubkey) -> String {
        format!(
            "https://explorer.solana.com/address/{}{}",
            address,
            self.explorer_suffix()
        )
    }

    /// Explorer link for a transaction on this network
    pub fn explorer_tx_url(&self, signature: &Signature) -> String {
        format!(
            "https://explorer.solana.com/tx/{}{}",
            signature,
            self.explorer_suffix()
        )
    }

    fn explorer_suffix(&self) -> &'static str {
        match self {
            Network::Devnet => "?cluster=devnet",
            Network::MainnetBeta => "",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "devnet" => Ok(Network::Devnet),
            "mainnet-beta" | "mainnet" => Ok(Network::MainnetBeta),
            other => Err(ValidationError::UnknownNetwork(other.to_string())),
        }
    }
}

/// The three administrative authorities of a new asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityKind {
    Mint,
    Freeze,
    Update,
}

impl AuthorityKind {
    pub const ALL: [AuthorityKind; 3] =
        [AuthorityKind::Mint, AuthorityKind::Freeze, AuthorityKind::Update];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorityKind::Mint => "mint",
            AuthorityKind::Freeze => "freeze",
            AuthorityKind::Update => "update",
        }
    }
}

impl fmt::Display for AuthorityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with one authority after the asset exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "target", rename_all = "lowercase")]
pub enum AuthorityDirective {
    /// Payer keeps the authority
    Keep,
    /// Authority set to none. Permanent.
    Revoke,
    /// Authority reassigned to another address
    Transfer(Pubkey),
}

impl AuthorityDirective {
    /// Parse a form selection (`keep` / `revoke` / `transfer` + target)
    pub fn parse(kind: AuthorityKind, input: &AuthorityInput) -> Result<Self, ValidationError> {
        match input.mode.trim().to_ascii_lowercase().as_str() {
            "" | "keep" => Ok(AuthorityDirective::Keep),
            "revoke" => Ok(AuthorityDirective::Revoke),
            "transfer" => {
                let target = input.target.trim();
                if target.is_empty() {
                    return Err(ValidationError::MissingField(transfer_target_field(kind)));
                }
                let address = parse_address(target).map_err(|source| {
                    ValidationError::InvalidAuthorityTarget {
                        authority: kind,
                        source,
                    }
                })?;
                Ok(AuthorityDirective::Transfer(address))
            }
            other => Err(ValidationError::UnknownAuthorityMode {
                authority: kind,
                mode: other.to_string(),
            }),
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, AuthorityDirective::Keep)
    }

    /// New authority for a change step: `None` if no step is needed,
    /// `Some(None)` to revoke, `Some(Some(key))` to transfer
    pub fn change(&self) -> Option<Option<Pubkey>> {
        match self {
            AuthorityDirective::Keep => None,
            AuthorityDirective::Revoke => Some(None),
            AuthorityDirective::Transfer(target) => Some(Some(*target)),
        }
    }

    /// Authority holder once the run has succeeded
    pub fn final_state(&self, payer: Pubkey) -> AuthorityState {
        match self {
            AuthorityDirective::Keep => AuthorityState::Payer(payer),
            AuthorityDirective::Revoke => AuthorityState::Revoked,
            AuthorityDirective::Transfer(target) => AuthorityState::Transferred(*target),
        }
    }
}

fn transfer_target_field(kind: AuthorityKind) -> &'static str {
    match kind {
        AuthorityKind::Mint => "mint authority transfer target",
        AuthorityKind::Freeze => "freeze authority transfer target",
        AuthorityKind::Update => "update authority transfer target",
    }
}

/// One directive per authority kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityDirectives {
    pub mint: AuthorityDirective,
    pub freeze: AuthorityDirective,
    pub update: AuthorityDirective,
}

impl AuthorityDirectives {
    pub fn keep_all() -> Self {
        Self {
            mint: AuthorityDirective::Keep,
            freeze: AuthorityDirective::Keep,
            update: AuthorityDirective::Keep,
        }
    }

    pub fn get(&self, kind: AuthorityKind) -> &AuthorityDirective {
        match kind {
            AuthorityKind::Mint => &self.mint,
            AuthorityKind::Freeze => &self.freeze,
            AuthorityKind::Update => &self.update,
        }
    }

    /// Directives in declaration order (mint, freeze, update)
    pub fn iter(&self) -> impl Iterator<Item = (AuthorityKind, &AuthorityDirective)> {
        AuthorityKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    /// Metadata must be created immutable when the update authority is revoked
    pub fn metadata_is_mutable(&self) -> bool {
        !matches!(self.update, AuthorityDirective::Revoke)
    }
}

/// Raw authority selection from a form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityInput {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub target: String,
}

impl AuthorityInput {
    pub fn keep() -> Self {
        Self {
            mode: "keep".to_string(),
            target: String::new(),
        }
    }

    pub fn revoke() -> Self {
        Self {
            mode: "revoke".to_string(),
            target: String::new(),
        }
    }

    pub fn transfer(target: impl Into<String>) -> Self {
        Self {
            mode: "transfer".to_string(),
            target: target.into(),
        }
    }
}

/// Icon image bytes as picked by the user
#[derive(Clone, PartialEq, Eq)]
pub struct IconImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl IconImage {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guess the MIME type from a file extension
    pub fn content_type_for(file_name: &str) -> &'static str {
        let ext = file_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

impl fmt::Debug for IconImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IconImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Unvalidated form input, every field as the user typed it
#[derive(Debug, Clone, Default)]
pub struct TokenForm {
    pub network: String,
    pub custom_rpc_url: String,
    pub payer_key: String,
    pub name: String,
    pub symbol: String,
    pub supply: String,
    pub decimals: String,
    pub description: String,
    pub external_url: String,
    pub icon: Option<IconImage>,
    pub mint_authority: AuthorityInput,
    pub freeze_authority: AuthorityInput,
    pub update_authority: AuthorityInput,
}

/// Descriptive token fields, already validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDetails {
    pub name: String,
    pub symbol: String,
    pub supply: u64,
    pub decimals: u8,
    pub description: String,
    pub external_url: Option<String>,
}

impl TokenDetails {
    /// Supply expressed in base units (supply * 10^decimals)
    pub fn base_unit_supply(&self) -> u64 {
        // Overflow is rejected during validation
        self.supply
            .saturating_mul(10u64.saturating_pow(u32::from(self.decimals)))
    }
}

/// Validated, immutable creation request
#[derive(Debug, Clone)]
pub struct CreationRequest {
    network: Network,
    custom_endpoint: Option<String>,
    payer: WalletManager,
    token: TokenDetails,
    icon: IconImage,
    authorities: AuthorityDirectives,
}

impl CreationRequest {
    /// Validate a whole form. Never touches the network.
    pub fn from_form(form: &TokenForm) -> Result<Self, ValidationError> {
        let network = Network::from_str(&form.network)?;

        let custom_endpoint = match form.custom_rpc_url.trim() {
            "" => None,
            url => Some(validate_http_url("custom RPC URL", url)?),
        };

        let payer =
            WalletManager::from_base58(&form.payer_key).map_err(ValidationError::InvalidKey)?;

        let name = required_text("name", &form.name, MAX_NAME_LENGTH)?;
        let symbol = required_text("symbol", &form.symbol, MAX_SYMBOL_LENGTH)?;
        let supply = parse_supply(&form.supply)?;
        let decimals = parse_decimals(&form.decimals)?;

        10u64
            .checked_pow(u32::from(decimals))
            .and_then(|scale| supply.checked_mul(scale))
            .ok_or(ValidationError::SupplyOverflow { supply, decimals })?;

        let external_url = match form.external_url.trim() {
            "" => None,
            url => Some(validate_http_url("external URL", url)?),
        };

        let icon = match &form.icon {
            Some(icon) if !icon.bytes.is_empty() => icon.clone(),
            _ => return Err(ValidationError::MissingIcon),
        };

        let authorities = AuthorityDirectives {
            mint: AuthorityDirective::parse(AuthorityKind::Mint, &form.mint_authority)?,
            freeze: AuthorityDirective::parse(AuthorityKind::Freeze, &form.freeze_authority)?,
            update: AuthorityDirective::parse(AuthorityKind::Update, &form.update_authority)?,
        };

        let payer_key = payer.pubkey();
        for (kind, directive) in authorities.iter() {
            if let AuthorityDirective::Transfer(target) = directive {
                if *target == payer_key {
                    return Err(ValidationError::TransferToPayer { authority: kind });
                }
            }
        }

        Ok(Self {
            network,
            custom_endpoint,
            payer,
            token: TokenDetails {
                name,
                symbol,
                supply,
                decimals,
                description: form.description.trim().to_string(),
                external_url,
            },
            icon,
            authorities,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn custom_endpoint(&self) -> Option<&str> {
        self.custom_endpoint.as_deref()
    }

    pub fn payer(&self) -> &WalletManager {
        &self.payer
    }

    pub fn token(&self) -> &TokenDetails {
        &self.token
    }

    pub fn icon(&self) -> &IconImage {
        &self.icon
    }

    pub fn authorities(&self) -> &AuthorityDirectives {
        &self.authorities
    }
}

impl TryFrom<TokenForm> for CreationRequest {
    type Error = ValidationError;

    fn try_from(form: TokenForm) -> Result<Self, Self::Error> {
        Self::from_form(&form)
    }
}

impl TryFrom<&TokenForm> for CreationRequest {
    type Error = ValidationError;

    fn try_from(form: &TokenForm) -> Result<Self, Self::Error> {
        Self::from_form(form)
    }
}

fn required_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if trimmed.len() > max {
        return Err(ValidationError::FieldTooLong {
            field,
            max,
            actual: trimmed.len(),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_supply(value: &str) -> Result<u64, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("supply"));
    }
    trimmed
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidInteger {
            field: "supply",
            value: trimmed.to_string(),
        })
}

fn parse_decimals(value: &str) -> Result<u8, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("decimals"));
    }
    let parsed = trimmed
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidInteger {
            field: "decimals",
            value: trimmed.to_string(),
        })?;
    if !(0..=i64::from(MAX_DECIMALS)).contains(&parsed) {
        return Err(ValidationError::DecimalsOutOfRange { value: parsed });
    }
    // Range checked above
    Ok(parsed as u8)
}

fn validate_http_url(field: &'static str, value: &str) -> Result<String, ValidationError> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            Ok(value.to_string())
        }
        _ => Err(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}

/// Final holder of one authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "address", rename_all = "lowercase")]
pub enum AuthorityState {
    Payer(Pubkey),
    Transferred(Pubkey),
    Revoked,
}

impl fmt::Display for AuthorityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityState::Payer(key) => write!(f, "kept by payer ({})", key),
            AuthorityState::Transferred(key) => write!(f, "transferred to {}", key),
            AuthorityState::Revoked => f.write_str("revoked"),
        }
    }
}

/// Authority layout after a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityStates {
    pub mint: AuthorityState,
    pub freeze: AuthorityState,
    pub update: AuthorityState,
    pub metadata_mutable: bool,
}

impl AuthorityStates {
    pub fn from_directives(directives: &AuthorityDirectives, payer: Pubkey) -> Self {
        Self {
            mint: directives.mint.final_state(payer),
            freeze: directives.freeze.final_state(payer),
            update: directives.update.final_state(payer),
            metadata_mutable: directives.metadata_is_mutable(),
        }
    }
}

/// Output of a run where every step confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationResult {
    pub mint: Pubkey,
    pub holding_account: Pubkey,
    pub metadata_account: Pubkey,
    pub metadata_uri: String,
    /// Confirmed signatures in submission order
    pub signatures: Vec<Signature>,
    pub network: Network,
    pub endpoint: String,
    pub authorities: AuthorityStates,
}

impl CreationResult {
    pub fn mint_explorer_url(&self) -> String {
        self.network.explorer_address_url(&self.mint)
    }

    pub fn transaction_explorer_urls(&self) -> Vec<String> {
        self.signatures
            .iter()
            .map(|sig| self.network.explorer_tx_url(sig))
            .collect()
    }
}
