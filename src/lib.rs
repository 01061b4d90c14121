//! tron-multisig: account-permission multisig transactions for TRON
//!
//! This crate provides the transaction engine behind a multisig wallet:
//! - Canonical protobuf encoding of raw transaction data
//! - Transaction identity (txId, which is also the signing digest)
//! - secp256k1 signing and signer recovery
//! - Weighted-threshold evaluation over account permissions
//! - Building transfers and permission updates from node envelopes
//! - The pending transaction lifecycle and its exchange document
//! - JSON persistence of pending transactions
//!
//! # Example
//!
//! ```rust
//! use tron_multisig::core::{Permission, PermissionKey};
//! use tron_multisig::multisig::meets_threshold;
//! use tron_multisig::wallet::Wallet;
//!
//! let (alice, bob, carol) = (Wallet::new(), Wallet::new(), Wallet::new());
//! let permission = Permission::owner(
//!     2,
//!     vec![
//!         PermissionKey::new(alice.address(), 1),
//!         PermissionKey::new(bob.address(), 1),
//!         PermissionKey::new(carol.address(), 1),
//!     ],
//! );
//!
//! assert!(!meets_threshold(&permission, &[alice.address()]));
//! assert!(meets_threshold(&permission, &[alice.address(), carol.address()]));
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod network;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use config::ClientConfig;
pub use core::{Permission, PermissionKey, Transaction, TxId};
pub use crypto::{Address, KeyPair};
pub use multisig::{AssetType, MultisigError, PendingStatus, PendingTransaction, TransactionBuilder};
pub use network::{ChainNode, HttpNode};
pub use storage::PendingStore;
pub use wallet::Wallet;
