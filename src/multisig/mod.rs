//! Account-permission multisig engine
//!
//! An account's permission (owner or active) lists weighted keys and a
//! threshold. A transaction authorized by that permission is valid once the
//! recovered signers' weights add up to the threshold.
//!
//! # Example
//!
//! ```ignore
//! use tron_multisig::multisig::{AssetType, TransactionBuilder};
//!
//! // Propose a 2-of-3 transfer from the shared account
//! let builder = TransactionBuilder::new(&node, &config);
//! let pending = builder
//!     .build_transfer(&shared, &recipient, 1_000_000, &AssetType::Native, 2)
//!     .await?;
//!
//! // Collect signatures
//! let pending = pending.sign(&alice)?;
//! let pending = pending.sign(&bob)?;
//!
//! // Threshold met: hand it to the node
//! let pending = pending.broadcast(&node).await?;
//! ```

pub mod builder;
pub mod document;
pub mod permission;
pub mod signature;
pub mod transaction;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::WireError;
use crate::crypto::{Address, KeyError};
use crate::network::NodeError;

pub use builder::{token_balance, TransactionBuilder};
pub use document::{export_document, import_document, PendingDocument};
pub use permission::{
    is_authorized, meets_threshold, permits, validate_permission, weight_of, MAX_ACTIVE_PERMISSIONS,
    MAX_PERMISSION_KEYS,
};
pub use signature::{add_signature, effective_signers, merge_signatures, recover_signer};
pub use transaction::{AssetType, PendingStatus, PendingTransaction, Reissued};

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
    #[error("Encoding error: {0}")]
    Wire(WireError),
    #[error("Unsupported contract type: {0}")]
    UnsupportedContractType(String),
    #[error("Signature recovery failed: {0}")]
    SignatureRecovery(String),
    #[error("Threshold not met: weight {weight} of {threshold}")]
    ThresholdNotMet { weight: i64, threshold: i64 },
    #[error("Transaction expired at {expires_at}")]
    ExpiredTransaction { expires_at: DateTime<Utc> },
    #[error("Signer not authorized: {0}")]
    UnauthorizedSigner(Address),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Broadcast of {} failed: {source}", .transaction.tx_id())]
    BroadcastFailed {
        /// The transaction, now `Failed`, with the node's message retained
        transaction: Box<PendingTransaction>,
        source: NodeError,
    },
    #[error("Document error: {0}")]
    Document(#[from] serde_json::Error),
}

impl From<WireError> for MultisigError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::UnsupportedContractType(name) => MultisigError::UnsupportedContractType(name),
            other => MultisigError::Wire(other),
        }
    }
}
