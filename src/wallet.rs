//! Wallet management module
//!
//! Decodes payer key material and parses on-ledger addresses. Everything in
//! here is syntactic: nothing consults the network.

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Length of an ed25519 keypair (secret || public)
pub const KEYPAIR_LENGTH: usize = 64;

/// Errors raised while decoding keys or addresses
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressCodecError {
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to read keypair file {path}: {reason}")]
    KeyFileUnreadable { path: String, reason: String },
}

/// Decode a base58-encoded 64-byte keypair
pub fn decode_key(base58_text: &str) -> Result<Keypair, AddressCodecError> {
    let trimmed = base58_text.trim();
    if trimmed.is_empty() {
        return Err(AddressCodecError::InvalidKeyFormat(
            "key material is empty".to_string(),
        ));
    }

    let bytes = bs58::decode(trimmed)
        .into_vec()
        .map_err(|e| AddressCodecError::InvalidKeyFormat(format!("not valid base58: {}", e)))?;

    keypair_from_bytes(&bytes)
}

/// Decode the Solana CLI keypair format (a JSON array of 64 bytes)
pub fn decode_key_json(text: &str) -> Result<Keypair, AddressCodecError> {
    let bytes: Vec<u8> = serde_json::from_str(text.trim()).map_err(|e| {
        AddressCodecError::InvalidKeyFormat(format!("not a JSON byte array: {}", e))
    })?;

    keypair_from_bytes(&bytes)
}

fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair, AddressCodecError> {
    if bytes.len() != KEYPAIR_LENGTH {
        return Err(AddressCodecError::InvalidKeyFormat(format!(
            "expected {} bytes, got {}",
            KEYPAIR_LENGTH,
            bytes.len()
        )));
    }
    if bytes.iter().all(|&b| b == 0) {
        return Err(AddressCodecError::InvalidKeyFormat(
            "all-zero key rejected".to_string(),
        ));
    }

    Keypair::try_from(bytes)
        .map_err(|e| AddressCodecError::InvalidKeyFormat(format!("inconsistent keypair: {}", e)))
}

/// Parse a base58 on-ledger address
pub fn parse_address(text: &str) -> Result<Pubkey, AddressCodecError> {
    let trimmed = text.trim();
    Pubkey::from_str(trimmed).map_err(|e| AddressCodecError::InvalidAddress {
        address: trimmed.to_string(),
        reason: e.to_string(),
    })
}

/// Holds the payer keypair for a single creation run
///
/// Cloning shares the underlying keypair; the secret is never printed.
#[derive(Clone)]
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl WalletManager {
    /// Load a keypair file in either JSON byte-array or base58 text form
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AddressCodecError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| AddressCodecError::KeyFileUnreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let keypair = if content.trim_start().starts_with('[') {
            decode_key_json(&content)?
        } else {
            decode_key(&content)?
        };

        Ok(Self::from_keypair(keypair))
    }

    /// Build from base58 key material
    pub fn from_base58(text: &str) -> Result<Self, AddressCodecError> {
        decode_key(text).map(Self::from_keypair)
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("pubkey", &self.pubkey())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key_roundtrips_generated_keypair() {
        let keypair = Keypair::new();
        let decoded = decode_key(&keypair.to_base58_string()).unwrap();
        assert_eq!(decoded.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_decode_key_rejects_bad_input() {
        assert!(matches!(
            decode_key(""),
            Err(AddressCodecError::InvalidKeyFormat(_))
        ));
        // '0' and 'O' are outside the base58 alphabet
        assert!(matches!(
            decode_key("0OIl"),
            Err(AddressCodecError::InvalidKeyFormat(_))
        ));
        // A valid address is base58 but only 32 bytes
        let address = Pubkey::new_unique().to_string();
        assert!(matches!(
            decode_key(&address),
            Err(AddressCodecError::InvalidKeyFormat(_))
        ));
        let zeros = bs58::encode([0u8; 64]).into_string();
        assert!(matches!(
            decode_key(&zeros),
            Err(AddressCodecError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn test_decode_key_json() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        let decoded = decode_key_json(&json).unwrap();
        assert_eq!(decoded.pubkey(), keypair.pubkey());

        assert!(decode_key_json("[1,2,3]").is_err());
        assert!(decode_key_json("not json").is_err());
    }

    #[test]
    fn test_parse_address() {
        let key = Pubkey::new_unique();
        assert_eq!(parse_address(&format!("  {}  ", key)).unwrap(), key);

        let err = parse_address("definitely-not-an-address").unwrap_err();
        assert!(matches!(err, AddressCodecError::InvalidAddress { .. }));
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_wallet_from_file_accepts_both_formats() {
        let keypair = Keypair::new();
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("id.json");
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        std::fs::write(&json_path, json).unwrap();
        assert_eq!(
            WalletManager::from_file(&json_path).unwrap().pubkey(),
            keypair.pubkey()
        );

        let b58_path = dir.path().join("id.b58");
        std::fs::write(&b58_path, format!("{}\n", keypair.to_base58_string())).unwrap();
        assert_eq!(
            WalletManager::from_file(&b58_path).unwrap().pubkey(),
            keypair.pubkey()
        );

        let missing = WalletManager::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, AddressCodecError::KeyFileUnreadable { .. }));
    }

    #[test]
    fn test_wallet_debug_hides_secret() {
        let wallet = WalletManager::from_keypair(Keypair::new());
        let rendered = format!("{:?}", wallet);
        assert!(rendered.contains(&wallet.pubkey().to_string()));
        assert!(!rendered.contains(&wallet.keypair().to_base58_string()));
    }
}
