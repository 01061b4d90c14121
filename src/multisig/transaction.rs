//! Pending multisig transaction lifecycle
//!
//! ```text
//! Pending ──sign──▶ Ready ──broadcast──▶ Broadcast ──confirm──▶ Confirmed
//!    │                │                      │
//!    └──── expire ────┴──▶ Expired           └──▶ Failed
//! ```
//!
//! Every transition returns a new value; the previous one is left as it was.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::permission::{is_authorized, meets_threshold, weight_of};
use super::signature::{add_signature, effective_signers, merge_signatures, recover_signer};
use super::MultisigError;
use crate::core::{ContractType, Permission, Transaction, TxId};
use crate::crypto::{sha256, Address};
use crate::network::ChainNode;
use crate::wallet::Wallet;

/// Status of a pending multisig transaction
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PendingStatus {
    /// Waiting for more signatures
    Pending,
    /// Signature weight meets the threshold
    Ready,
    /// Accepted by the node
    Broadcast,
    /// Executed successfully on chain
    Confirmed,
    /// Expired before it was broadcast
    Expired,
    /// Rejected by the node or failed on chain
    Failed,
}

impl PendingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PendingStatus::Confirmed | PendingStatus::Expired | PendingStatus::Failed
        )
    }

    /// Still collecting signatures
    pub fn is_open(self) -> bool {
        matches!(self, PendingStatus::Pending | PendingStatus::Ready)
    }

    /// Progress order used when reconciling two copies
    fn rank(self) -> u8 {
        match self {
            PendingStatus::Pending => 0,
            PendingStatus::Ready => 1,
            PendingStatus::Expired => 2,
            PendingStatus::Broadcast => 3,
            PendingStatus::Failed => 4,
            PendingStatus::Confirmed => 5,
        }
    }
}

/// What is being moved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AssetType {
    /// The chain's native coin, in sun
    Native,
    /// A TRC-20 token, in its smallest unit
    Token { contract: Address },
}

/// A transaction collecting signatures
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "super::document::PendingDocument", into = "super::document::PendingDocument")]
pub struct PendingTransaction {
    pub(crate) id: String,
    pub(crate) transaction: Transaction,
    pub(crate) from: Address,
    pub(crate) to: Option<Address>,
    pub(crate) amount: i64,
    pub(crate) asset_type: Option<AssetType>,
    /// Snapshot of the authorizing permission taken at build time
    pub(crate) permission: Permission,
    pub(crate) signers: Vec<Address>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) expires_at: DateTime<Utc>,
    pub(crate) status: PendingStatus,
    pub(crate) broadcast_tx_id: Option<TxId>,
    pub(crate) error_message: Option<String>,
    pub(crate) description: Option<String>,
}

/// Result of re-issuing a transaction with a later expiration
#[derive(Clone, Debug)]
pub struct Reissued {
    /// The new, unsigned transaction
    pub pending: PendingTransaction,
    /// The transaction it replaces, unchanged
    pub superseded: PendingTransaction,
    /// Signers whose signatures do not carry over
    pub invalidated_signers: Vec<Address>,
}

impl PendingTransaction {
    /// Wrap a freshly built transaction
    pub(crate) fn new(
        transaction: Transaction,
        permission: Permission,
        to: Option<Address>,
        amount: i64,
        asset_type: Option<AssetType>,
    ) -> Result<Self, MultisigError> {
        let now = Utc::now();
        let from = *transaction.contract().parameter.owner_address();
        let expires_at = millis_to_datetime(transaction.expiration())?;

        // Generate unique ID from transaction details
        let id_data = format!(
            "{}{}{}{}{}",
            from,
            to.map(|a| a.to_string()).unwrap_or_default(),
            amount,
            now.timestamp_nanos_opt().unwrap_or(0),
            transaction.tx_id()
        );
        let id = hex::encode(&sha256(id_data.as_bytes())[..16]);

        let pending = Self {
            id,
            transaction,
            from,
            to,
            amount,
            asset_type,
            permission,
            signers: Vec::new(),
            created_at: now,
            expires_at,
            status: PendingStatus::Pending,
            broadcast_tx_id: None,
            error_message: None,
            description: None,
        };
        Ok(pending.recompute())
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tx_id(&self) -> &TxId {
        self.transaction.tx_id()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn contract_type(&self) -> ContractType {
        self.transaction.contract().contract_type()
    }

    pub fn from(&self) -> &Address {
        &self.from
    }

    pub fn to(&self) -> Option<&Address> {
        self.to.as_ref()
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn asset_type(&self) -> Option<&AssetType> {
        self.asset_type.as_ref()
    }

    pub fn permission(&self) -> &Permission {
        &self.permission
    }

    pub fn threshold(&self) -> i64 {
        self.permission.threshold
    }

    /// Recovered signers, in signing order
    pub fn signers(&self) -> &[Address] {
        &self.signers
    }

    /// Combined weight of the current signers
    pub fn weight(&self) -> i64 {
        weight_of(&self.permission, &self.signers)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn status(&self) -> PendingStatus {
        self.status
    }

    pub fn broadcast_tx_id(&self) -> Option<&TxId> {
        self.broadcast_tx_id.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn can_broadcast(&self) -> bool {
        self.can_broadcast_at(Utc::now())
    }

    pub fn can_broadcast_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open()
            && !self.is_expired_at(now)
            && meets_threshold(&self.permission, &self.signers)
    }

    /// Sign with the connected wallet
    pub fn sign(&self, wallet: &Wallet) -> Result<Self, MultisigError> {
        self.sign_at(wallet, Utc::now())
    }

    pub fn sign_at(&self, wallet: &Wallet, now: DateTime<Utc>) -> Result<Self, MultisigError> {
        self.ensure_not_expired(now)?;
        self.ensure_open("sign")?;

        let address = wallet.address();
        if !is_authorized(&self.permission, &address) {
            return Err(MultisigError::UnauthorizedSigner(address));
        }

        let signature = wallet.sign(self.tx_id())?;
        let signed = self.with_transaction(add_signature(&self.transaction, &signature));
        log::info!(
            "{} signed {} (weight {}/{})",
            address,
            self.tx_id(),
            signed.weight(),
            signed.threshold()
        );
        Ok(signed)
    }

    /// Add a signature produced elsewhere, e.g. by a co-signer
    pub fn add_signature(&self, signature: &[u8]) -> Result<Self, MultisigError> {
        self.ensure_not_expired(Utc::now())?;
        self.ensure_open("add a signature to")?;

        let signer = recover_signer(self.tx_id(), signature)?;
        if !is_authorized(&self.permission, &signer) {
            return Err(MultisigError::UnauthorizedSigner(signer));
        }
        Ok(self.with_transaction(add_signature(&self.transaction, signature)))
    }

    /// Reconcile with another copy of the same transaction
    pub fn merge(&self, other: &PendingTransaction) -> Result<Self, MultisigError> {
        let mut merged = self.clone();
        merged.transaction = merge_signatures(&self.transaction, &other.transaction)?;

        if other.status.rank() > self.status.rank() {
            merged.status = other.status;
            merged.broadcast_tx_id = other.broadcast_tx_id;
            merged.error_message = other.error_message.clone();
        }
        if merged.description.is_none() {
            merged.description = other.description.clone();
        }
        Ok(merged.recompute())
    }

    /// Submit to the node. Only a transaction whose signers meet the
    /// threshold and that has not expired is sent; it is never retried.
    pub async fn broadcast<N: ChainNode + ?Sized>(&self, node: &N) -> Result<Self, MultisigError> {
        self.broadcast_at(node, Utc::now()).await
    }

    pub async fn broadcast_at<N: ChainNode + ?Sized>(
        &self,
        node: &N,
        now: DateTime<Utc>,
    ) -> Result<Self, MultisigError> {
        self.ensure_not_expired(now)?;
        self.ensure_open("broadcast")?;

        let weight = self.weight();
        if weight < self.threshold() {
            return Err(MultisigError::ThresholdNotMet {
                weight,
                threshold: self.threshold(),
            });
        }

        log::info!("Broadcasting {} ({} signers)", self.tx_id(), self.signers.len());
        match node.broadcast_transaction(&self.submission()).await {
            Ok(tx_id) => {
                if tx_id != *self.tx_id() {
                    log::warn!("Node reported txid {} for {}", tx_id, self.tx_id());
                }
                let mut next = self.clone();
                next.status = PendingStatus::Broadcast;
                next.broadcast_tx_id = Some(tx_id);
                next.error_message = None;
                Ok(next)
            }
            Err(source) => {
                log::error!("Broadcast of {} failed: {}", self.tx_id(), source);
                let mut failed = self.clone();
                failed.status = PendingStatus::Failed;
                failed.error_message = Some(source.to_string());
                Err(MultisigError::BroadcastFailed {
                    transaction: Box::new(failed),
                    source,
                })
            }
        }
    }

    /// Record expiry if the deadline has passed while still collecting
    pub fn expire_if_due(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if self.status.is_open() && self.is_expired_at(now) {
            log::info!("{} expired at {}", self.tx_id(), self.expires_at);
            next.status = PendingStatus::Expired;
        }
        next
    }

    /// Ask the node whether a broadcast transaction made it into a block
    pub async fn check_confirmation<N: ChainNode + ?Sized>(
        &self,
        node: &N,
    ) -> Result<Self, MultisigError> {
        if self.status != PendingStatus::Broadcast {
            return Err(MultisigError::InvalidState(format!(
                "cannot confirm a transaction in state {:?}",
                self.status
            )));
        }

        let tx_id = self.broadcast_tx_id.unwrap_or(*self.tx_id());
        let mut next = self.clone();
        match node.get_transaction_info(&tx_id).await? {
            None => log::debug!("{} not yet in a block", tx_id),
            Some(info) if info.success => {
                log::info!("{} confirmed in block {}", tx_id, info.block_number);
                next.status = PendingStatus::Confirmed;
            }
            Some(info) => {
                let message = info
                    .message
                    .unwrap_or_else(|| "execution failed".to_string());
                log::warn!("{} failed in block {}: {}", tx_id, info.block_number, message);
                next.status = PendingStatus::Failed;
                next.error_message = Some(message);
            }
        }
        Ok(next)
    }

    /// Re-issue with the expiration pushed `extra_secs` further out.
    ///
    /// The id changes, so every collected signature is void; the old value
    /// and the affected signers are returned alongside the new transaction.
    pub fn reissue(&self, extra_secs: i64) -> Result<Reissued, MultisigError> {
        if !(self.status.is_open() || self.status == PendingStatus::Expired) {
            return Err(MultisigError::InvalidState(format!(
                "cannot re-issue a transaction in state {:?}",
                self.status
            )));
        }

        let transaction = self.transaction.extend_expiration(extra_secs)?;
        let mut pending = self.clone();
        pending.expires_at = millis_to_datetime(transaction.expiration())?;
        pending.transaction = transaction;
        pending.status = PendingStatus::Pending;
        pending.error_message = None;
        let pending = pending.recompute();

        if !self.signers.is_empty() {
            log::warn!(
                "Re-issued {} as {}; {} signature(s) must be collected again",
                self.tx_id(),
                pending.tx_id(),
                self.signers.len()
            );
        }

        Ok(Reissued {
            pending,
            superseded: self.clone(),
            invalidated_signers: self.signers.clone(),
        })
    }

    /// Same record over a different transaction, signers re-derived
    fn with_transaction(&self, transaction: Transaction) -> Self {
        let mut next = self.clone();
        next.transaction = transaction;
        next.recompute()
    }

    /// Re-derive signers from the signatures and, while open, the status
    /// from the threshold
    pub(crate) fn recompute(mut self) -> Self {
        self.signers = effective_signers(&self.transaction);
        if self.status.is_open() {
            self.status = if meets_threshold(&self.permission, &self.signers) {
                PendingStatus::Ready
            } else {
                PendingStatus::Pending
            };
        }
        self
    }

    /// The transaction as sent to the node: one signature per authorized
    /// signer, in signing order. Signatures that do not recover to a key of
    /// the permission would make the node reject the whole transaction.
    fn submission(&self) -> Transaction {
        let mut seen = Vec::new();
        let signatures = self
            .transaction
            .signatures()
            .iter()
            .filter(|signature| match recover_signer(self.tx_id(), signature) {
                Ok(signer) if is_authorized(&self.permission, &signer) && !seen.contains(&signer) => {
                    seen.push(signer);
                    true
                }
                _ => false,
            })
            .cloned()
            .collect();
        self.transaction.with_signatures(signatures)
    }

    fn ensure_open(&self, action: &str) -> Result<(), MultisigError> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(MultisigError::InvalidState(format!(
                "cannot {} a transaction in state {:?}",
                action, self.status
            )))
        }
    }

    /// Records already marked `Expired`, and open ones past their deadline,
    /// report expiry rather than a state error
    fn ensure_not_expired(&self, now: DateTime<Utc>) -> Result<(), MultisigError> {
        let past_deadline = self.status.is_open() && self.is_expired_at(now);
        if self.status == PendingStatus::Expired || past_deadline {
            return Err(MultisigError::ExpiredTransaction {
                expires_at: self.expires_at,
            });
        }
        Ok(())
    }
}

pub(crate) fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, MultisigError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| MultisigError::Validation(format!("timestamp {} out of range", ms)))
}
