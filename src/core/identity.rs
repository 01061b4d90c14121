//! Transaction identity
//!
//! `txId = SHA256(encode(raw_data))`. The same 32 bytes are the on-chain
//! transaction hash and the digest every participant signs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::raw::RawTransactionData;
use super::wire::{self, WireError};
use crate::crypto::sha256;

/// A 32-byte transaction id
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId([u8; 32]);

impl TxId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The signing digest
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for TxId {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| WireError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| WireError::InvalidHex(format!("txid has {} bytes", v.len())))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.to_hex())
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute the id of raw transaction data
pub fn transaction_id(raw: &RawTransactionData) -> TxId {
    TxId(sha256(&wire::encode(raw)))
}

/// Check a node-provided envelope against the local encoding.
///
/// `claimed_id` is the node's `txID`; `claimed_raw_hex`, when the node sent
/// one, must be byte-identical to our encoding of `raw`.
pub fn verify_envelope(
    raw: &RawTransactionData,
    claimed_id: &TxId,
    claimed_raw_hex: Option<&str>,
) -> Result<TxId, WireError> {
    let encoded = wire::encode(raw);

    if let Some(raw_hex) = claimed_raw_hex {
        let local_hex = hex::encode(&encoded);
        if !raw_hex.eq_ignore_ascii_case(&local_hex) {
            return Err(WireError::IdentityMismatch {
                claimed: raw_hex.to_string(),
                computed: local_hex,
            });
        }
    }

    let computed = TxId(sha256(&encoded));
    if computed != *claimed_id {
        return Err(WireError::IdentityMismatch {
            claimed: claimed_id.to_hex(),
            computed: computed.to_hex(),
        });
    }
    Ok(computed)
}
