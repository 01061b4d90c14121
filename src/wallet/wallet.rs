//! Connected wallet
//!
//! The key material of one participant. It is passed explicitly into every
//! signing call; nothing in the engine holds a wallet globally.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::TxId;
use crate::crypto::{Address, KeyError, KeyPair};

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("Wallet file address {stored} does not match key address {derived}")]
    AddressMismatch { stored: String, derived: String },
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: String,
    label: Option<String>,
}

/// A participant's signing key and its derived address
#[derive(Clone)]
pub struct Wallet {
    key_pair: KeyPair,
    address: Address,
    /// Optional label for the wallet
    pub label: Option<String>,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self::from_key_pair(KeyPair::generate())
    }

    /// Create a wallet with a label
    pub fn with_label(label: &str) -> Self {
        let mut wallet = Self::new();
        wallet.label = Some(label.to_string());
        wallet
    }

    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        let address = key_pair.address();
        Self {
            key_pair,
            address,
            label: None,
        }
    }

    /// Import a wallet from a hex private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        Ok(Self::from_key_pair(KeyPair::from_private_key_hex(
            private_key_hex,
        )?))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the wallet's public key (uncompressed hex)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    /// Sign a transaction id; returns the 65-byte `r || s || v` signature
    pub fn sign(&self, tx_id: &TxId) -> Result<Vec<u8>, KeyError> {
        Ok(self.key_pair.sign(tx_id.as_bytes())?.to_bytes().to_vec())
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_key_hex: self.private_key(),
            address: self.address.to_base58(),
            label: self.label.clone(),
        };

        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;

        let mut wallet = Self::from_private_key(&data.private_key_hex)?;
        let stored: Address = data.address.parse()?;
        if stored != wallet.address {
            return Err(WalletError::AddressMismatch {
                stored: data.address,
                derived: wallet.address.to_base58(),
            });
        }
        wallet.label = data.label;
        Ok(wallet)
    }

    /// Export wallet info (without private key)
    pub fn export_public_info(&self) -> WalletInfo {
        WalletInfo {
            address: self.address.to_base58(),
            hex_address: self.address.to_hex(),
            public_key: self.public_key(),
            label: self.label.clone(),
        }
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub hex_address: String,
    pub public_key: String,
    pub label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::recover_address;

    #[test]
    fn test_wallet_import() {
        let wallet1 = Wallet::new();
        let private_key = wallet1.private_key();

        let wallet2 = Wallet::from_private_key(&private_key).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
    }

    #[test]
    fn test_wallet_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_wallet.json");

        let wallet1 = Wallet::with_label("Test Wallet");
        wallet1.save(&path).unwrap();

        let wallet2 = Wallet::load(&path).unwrap();
        assert_eq!(wallet1.address(), wallet2.address());
        assert_eq!(wallet1.label, wallet2.label);
    }

    #[test]
    fn test_tampered_wallet_file_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wallet.json");

        let wallet = Wallet::new();
        wallet.save(&path).unwrap();
        let json = fs::read_to_string(&path).unwrap().replace(
            &wallet.address().to_base58(),
            &Wallet::new().address().to_base58(),
        );
        fs::write(&path, json).unwrap();

        assert!(matches!(
            Wallet::load(&path),
            Err(WalletError::AddressMismatch { .. })
        ));
    }

    #[test]
    fn test_signature_recovers_wallet_address() {
        let wallet = Wallet::new();
        let tx_id = TxId::from_bytes(crate::crypto::sha256(b"transfer"));
        let signature = wallet.sign(&tx_id).unwrap();

        assert_eq!(signature.len(), 65);
        assert!(signature[64] <= 1);
        assert_eq!(
            recover_address(tx_id.as_bytes(), &signature).unwrap(),
            wallet.address()
        );
        // Deterministic nonces
        assert_eq!(wallet.sign(&tx_id).unwrap(), signature);
    }
}
