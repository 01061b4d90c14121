//! Raw (unsigned) transaction data
//!
//! The canonical payload whose encoding is hashed into the transaction id.

use serde::{Deserialize, Serialize};

use super::contract::{ContractCall, ContractJson};
use super::encoding::{hex_bytes, is_zero_i64};
use super::wire::WireError;

/// Raw transaction data. Immutable by convention: helpers return new values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDataJson", into = "RawDataJson")]
pub struct RawTransactionData {
    /// Bytes 6..8 of the reference block height (freshness token)
    pub ref_block_bytes: Vec<u8>,
    pub ref_block_num: i64,
    /// Bytes 8..16 of the reference block hash (freshness token)
    pub ref_block_hash: Vec<u8>,
    /// Epoch milliseconds after which the chain rejects the transaction
    pub expiration: i64,
    /// Optional memo
    pub data: Vec<u8>,
    pub contract: ContractCall,
    /// Epoch milliseconds of creation
    pub timestamp: i64,
    pub fee_limit: i64,
}

impl RawTransactionData {
    /// Copy with a different expiration
    pub fn with_expiration(&self, expiration: i64) -> Self {
        Self {
            expiration,
            ..self.clone()
        }
    }
}

/// Node JSON form of `raw_data`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawDataJson {
    pub contract: Vec<ContractJson>,
    #[serde(with = "hex_bytes")]
    pub ref_block_bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub ref_block_num: i64,
    #[serde(with = "hex_bytes")]
    pub ref_block_hash: Vec<u8>,
    pub expiration: i64,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "hex_bytes"
    )]
    pub data: Vec<u8>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub fee_limit: i64,
}

impl TryFrom<RawDataJson> for RawTransactionData {
    type Error = WireError;

    fn try_from(json: RawDataJson) -> Result<Self, Self::Error> {
        if json.contract.len() != 1 {
            return Err(WireError::InvalidContract(format!(
                "expected exactly one contract, found {}",
                json.contract.len()
            )));
        }
        if json.expiration <= json.timestamp {
            return Err(WireError::InvalidExpiration(format!(
                "{} does not exceed timestamp {}",
                json.expiration, json.timestamp
            )));
        }

        let contract = json
            .contract
            .into_iter()
            .next()
            .ok_or_else(|| WireError::InvalidContract("missing contract".to_string()))?;

        Ok(RawTransactionData {
            ref_block_bytes: json.ref_block_bytes,
            ref_block_num: json.ref_block_num,
            ref_block_hash: json.ref_block_hash,
            expiration: json.expiration,
            data: json.data,
            contract: ContractCall::try_from(contract)?,
            timestamp: json.timestamp,
            fee_limit: json.fee_limit,
        })
    }
}

impl From<RawTransactionData> for RawDataJson {
    fn from(raw: RawTransactionData) -> Self {
        RawDataJson {
            contract: vec![ContractJson::from(raw.contract)],
            ref_block_bytes: raw.ref_block_bytes,
            ref_block_num: raw.ref_block_num,
            ref_block_hash: raw.ref_block_hash,
            expiration: raw.expiration,
            data: raw.data,
            timestamp: raw.timestamp,
            fee_limit: raw.fee_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::contract::{ContractParameter, TransferContract};
    use crate::crypto::KeyPair;

    fn sample() -> RawTransactionData {
        RawTransactionData {
            ref_block_bytes: vec![0x5e, 0x4b],
            ref_block_num: 0,
            ref_block_hash: vec![0xe3, 0xd1, 0xe2, 0xf2, 0xba, 0x5f, 0xa3, 0xb2],
            expiration: 1_700_000_060_000,
            data: vec![],
            contract: ContractCall::new(
                ContractParameter::Transfer(TransferContract {
                    owner_address: KeyPair::generate().address(),
                    to_address: KeyPair::generate().address(),
                    amount: 5,
                }),
                0,
            ),
            timestamp: 1_700_000_000_000,
            fee_limit: 0,
        }
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["ref_block_bytes"], "5e4b");
        assert_eq!(value["ref_block_hash"], "e3d1e2f2ba5fa3b2");
        assert_eq!(value["contract"].as_array().unwrap().len(), 1);
        assert!(value.get("fee_limit").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let raw = sample();
        let json = serde_json::to_string(&raw).unwrap();
        let back: RawTransactionData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_multiple_contracts_rejected() {
        let mut json = RawDataJson::from(sample());
        json.contract.push(json.contract[0].clone());
        assert!(RawTransactionData::try_from(json).is_err());
    }

    #[test]
    fn test_expiration_must_exceed_timestamp() {
        let mut json = RawDataJson::from(sample());
        json.expiration = json.timestamp;
        assert!(RawTransactionData::try_from(json).is_err());
    }

    #[test]
    fn test_with_expiration_leaves_original() {
        let raw = sample();
        let later = raw.with_expiration(raw.expiration + 1000);
        assert_eq!(later.expiration, raw.expiration + 1000);
        assert_eq!(raw.expiration, 1_700_000_060_000);
    }
}
