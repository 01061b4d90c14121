//! Exported transaction document
//!
//! The JSON form co-signers pass around out of band. Every field of a
//! pending transaction is carried, with the raw transaction in node JSON
//! form. Nothing in an imported document is trusted as-is: the id is
//! recomputed from the raw data and signers are recovered from the
//! signatures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::permission::validate_permission;
use super::transaction::{millis_to_datetime, AssetType, PendingStatus, PendingTransaction};
use super::MultisigError;
use crate::core::{ContractParameter, Permission, Transaction, TransactionJson, TxId};
use crate::crypto::Address;

/// Serialized form of a [`PendingTransaction`]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDocument {
    pub id: String,
    pub tx_id: TxId,
    pub raw_transaction: TransactionJson,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    pub amount: i64,
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    pub permission: Permission,
    pub threshold: i64,
    #[serde(default)]
    pub signers: Vec<Address>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: PendingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_tx_id: Option<TxId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<PendingTransaction> for PendingDocument {
    fn from(pending: PendingTransaction) -> Self {
        PendingDocument {
            id: pending.id,
            tx_id: *pending.transaction.tx_id(),
            raw_transaction: TransactionJson::from(pending.transaction),
            from: pending.from,
            to: pending.to,
            amount: pending.amount,
            asset_type: pending.asset_type,
            threshold: pending.permission.threshold,
            permission: pending.permission,
            signers: pending.signers,
            created_at: pending.created_at,
            expires_at: pending.expires_at,
            status: pending.status,
            broadcast_tx_id: pending.broadcast_tx_id,
            error_message: pending.error_message,
            description: pending.description,
        }
    }
}

impl TryFrom<PendingDocument> for PendingTransaction {
    type Error = MultisigError;

    fn try_from(doc: PendingDocument) -> Result<Self, Self::Error> {
        let transaction = Transaction::try_from(doc.raw_transaction)?;
        let invalid = |msg: String| Err(MultisigError::Validation(msg));

        if doc.tx_id != *transaction.tx_id() {
            return invalid(format!(
                "document txId {} does not match raw transaction {}",
                doc.tx_id,
                transaction.tx_id()
            ));
        }
        if doc.expires_at != millis_to_datetime(transaction.expiration())? {
            return invalid(format!(
                "document expiresAt {} does not match raw transaction",
                doc.expires_at
            ));
        }
        if doc.threshold != doc.permission.threshold {
            return invalid(format!(
                "document threshold {} does not match its permission ({})",
                doc.threshold, doc.permission.threshold
            ));
        }

        validate_permission(&doc.permission)?;

        let parameter = &transaction.contract().parameter;
        if doc.from != *parameter.owner_address() {
            return invalid(format!(
                "document from {} does not match contract owner {}",
                doc.from,
                parameter.owner_address()
            ));
        }
        if let ContractParameter::Transfer(transfer) = parameter {
            if doc.to != Some(transfer.to_address) || doc.amount != transfer.amount {
                return invalid("document recipient or amount does not match contract".to_string());
            }
        }

        let claimed_signers = doc.signers.clone();
        let pending = PendingTransaction {
            id: doc.id,
            transaction,
            from: doc.from,
            to: doc.to,
            amount: doc.amount,
            asset_type: doc.asset_type,
            permission: doc.permission,
            signers: doc.signers,
            created_at: doc.created_at,
            expires_at: doc.expires_at,
            status: doc.status,
            broadcast_tx_id: doc.broadcast_tx_id,
            error_message: doc.error_message,
            description: doc.description,
        }
        .recompute();

        if pending.signers != claimed_signers {
            log::warn!(
                "Document {} listed {} signer(s); {} recovered from signatures",
                pending.id,
                claimed_signers.len(),
                pending.signers.len()
            );
        }
        Ok(pending)
    }
}

/// Export as pretty-printed JSON
pub fn export_document(pending: &PendingTransaction) -> Result<String, MultisigError> {
    Ok(serde_json::to_string_pretty(&PendingDocument::from(
        pending.clone(),
    ))?)
}

/// Import and re-validate a document
pub fn import_document(json: &str) -> Result<PendingTransaction, MultisigError> {
    let doc: PendingDocument = serde_json::from_str(json)?;
    PendingTransaction::try_from(doc)
}
