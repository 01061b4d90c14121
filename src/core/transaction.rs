//! Transaction envelope
//!
//! A transaction is its raw data, the id derived from that data, and the
//! signatures collected over the id. The id is never stored independently
//! of the raw data: every constructor recomputes it, and any change to the
//! raw data yields a fresh, unsigned transaction.

use serde::{Deserialize, Serialize};

use super::contract::ContractCall;
use super::identity::{transaction_id, verify_envelope, TxId};
use super::raw::{RawDataJson, RawTransactionData};
use super::wire::{self, WireError};

// =============================================================================
// Constants
// =============================================================================

/// Longest lifetime the chain accepts, measured from `timestamp`
pub const MAX_EXPIRATION_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

// =============================================================================
// Transaction
// =============================================================================

/// A (possibly partially) signed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TransactionJson", into = "TransactionJson")]
pub struct Transaction {
    tx_id: TxId,
    raw_data: RawTransactionData,
    signatures: Vec<Vec<u8>>,
}

impl Transaction {
    /// Wrap raw data as an unsigned transaction
    pub fn new(raw_data: RawTransactionData) -> Self {
        Self {
            tx_id: transaction_id(&raw_data),
            raw_data,
            signatures: Vec::new(),
        }
    }

    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    pub fn raw_data(&self) -> &RawTransactionData {
        &self.raw_data
    }

    pub fn contract(&self) -> &ContractCall {
        &self.raw_data.contract
    }

    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }

    /// Expiration in epoch milliseconds
    pub fn expiration(&self) -> i64 {
        self.raw_data.expiration
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.raw_data.expiration
    }

    /// Hex of the canonical wire encoding
    pub fn raw_data_hex(&self) -> String {
        hex::encode(wire::encode(&self.raw_data))
    }

    /// Replace the raw data. The id is recomputed and all signatures are
    /// dropped, since none of them can be valid for the new id.
    pub fn with_raw_data(&self, raw_data: RawTransactionData) -> Self {
        Self::new(raw_data)
    }

    /// Push the expiration `extra_secs` seconds further out.
    ///
    /// Returns a new unsigned transaction; `self` is left untouched so the
    /// superseded id and its signatures stay inspectable.
    pub fn extend_expiration(&self, extra_secs: i64) -> Result<Self, WireError> {
        if extra_secs <= 0 {
            return Err(WireError::InvalidExpiration(format!(
                "extension must be positive, got {}s",
                extra_secs
            )));
        }

        let expiration = extra_secs
            .checked_mul(1000)
            .and_then(|ms| self.raw_data.expiration.checked_add(ms))
            .ok_or_else(|| WireError::InvalidExpiration("overflow".to_string()))?;

        if expiration - self.raw_data.timestamp > MAX_EXPIRATION_WINDOW_MS {
            return Err(WireError::InvalidExpiration(format!(
                "{} is more than 24h after timestamp {}",
                expiration, self.raw_data.timestamp
            )));
        }

        let extended = self.with_raw_data(self.raw_data.with_expiration(expiration));
        log::debug!(
            "Extended expiration by {}s: {} -> {}",
            extra_secs,
            self.tx_id,
            extended.tx_id
        );
        Ok(extended)
    }

    /// Same transaction carrying a different signature list
    pub(crate) fn with_signatures(&self, signatures: Vec<Vec<u8>>) -> Self {
        Self {
            tx_id: self.tx_id,
            raw_data: self.raw_data.clone(),
            signatures,
        }
    }
}

// =============================================================================
// Node JSON
// =============================================================================

/// Node JSON form of a transaction
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionJson {
    #[serde(default)]
    pub visible: bool,
    #[serde(rename = "txID")]
    pub tx_id: String,
    pub raw_data: RawDataJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data_hex: Option<String>,
    #[serde(rename = "signature", default, skip_serializing_if = "Vec::is_empty")]
    pub signatures: Vec<String>,
}

impl TryFrom<TransactionJson> for Transaction {
    type Error = WireError;

    /// Parse and verify: the claimed id (and raw hex, if present) must match
    /// the local encoding of `raw_data`.
    fn try_from(json: TransactionJson) -> Result<Self, Self::Error> {
        let raw_data = RawTransactionData::try_from(json.raw_data)?;
        let claimed: TxId = json.tx_id.parse()?;
        let tx_id = verify_envelope(&raw_data, &claimed, json.raw_data_hex.as_deref())?;

        let signatures = json
            .signatures
            .iter()
            .map(|s| hex::decode(s).map_err(|e| WireError::InvalidHex(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tx_id,
            raw_data,
            signatures,
        })
    }
}

impl From<Transaction> for TransactionJson {
    fn from(tx: Transaction) -> Self {
        let raw_data_hex = Some(tx.raw_data_hex());
        TransactionJson {
            visible: false,
            tx_id: tx.tx_id.to_hex(),
            raw_data: RawDataJson::from(tx.raw_data),
            raw_data_hex,
            signatures: tx.signatures.iter().map(hex::encode).collect(),
        }
    }
}
