//! Node HTTP message types
//!
//! JSON shapes returned by the node's `/wallet/*` endpoints, and the
//! decoding of node failures into [`NodeError`].

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::core::{Permission, TransactionJson, WireError};
use crate::crypto::Address;

/// Errors talking to a chain node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Node communication error: {0}")]
    Communication(String),
    #[error("Node rejected request ({reason}) [{code}]: {message}")]
    Rejection {
        reason: RejectionReason,
        code: String,
        message: String,
    },
    #[error("Invalid node response: {0}")]
    InvalidResponse(String),
    #[error("Account not found: {0}")]
    AccountNotFound(Address),
    #[error("Invalid transaction from node: {0}")]
    Envelope(#[from] WireError),
}

impl NodeError {
    /// Build a rejection, classifying the reason from the node's code and
    /// (already decoded) message
    pub fn rejection(code: &str, message: &str) -> Self {
        NodeError::Rejection {
            reason: RejectionReason::classify(code, message),
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Why the node refused a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    /// Not enough balance, bandwidth or energy
    InsufficientResources,
    BadSignature,
    Expired,
    /// Signers lack the permission or weight
    Unauthorized,
    Duplicate,
    Other,
}

impl RejectionReason {
    pub fn classify(code: &str, message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        match code {
            "SIGERROR" => return RejectionReason::BadSignature,
            "TRANSACTION_EXPIRATION_ERROR" | "TAPOS_ERROR" => return RejectionReason::Expired,
            "BANDWITH_ERROR" => return RejectionReason::InsufficientResources,
            "DUP_TRANSACTION_ERROR" => return RejectionReason::Duplicate,
            _ => {}
        }

        if message.contains("permission") || message.contains("authority") {
            RejectionReason::Unauthorized
        } else if message.contains("signature") {
            RejectionReason::BadSignature
        } else if message.contains("expired") {
            RejectionReason::Expired
        } else if message.contains("balance is not sufficient")
            || message.contains("energy")
            || message.contains("bandwidth")
        {
            RejectionReason::InsufficientResources
        } else if message.contains("dup") {
            RejectionReason::Duplicate
        } else {
            RejectionReason::Other
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::InsufficientResources => "insufficient resources",
            RejectionReason::BadSignature => "bad signature",
            RejectionReason::Expired => "expired",
            RejectionReason::Unauthorized => "unauthorized",
            RejectionReason::Duplicate => "duplicate",
            RejectionReason::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Node messages are usually hex-encoded UTF-8; fall back to the raw text
pub fn decode_hex_message(hex_msg: &str) -> String {
    hex::decode(hex_msg)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| hex_msg.to_string())
}

/// `{"result":true,"code":..,"message":..}` as nested in several responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnJson {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ReturnJson {
    fn into_error(self) -> NodeError {
        let code = self.code.unwrap_or_else(|| "OTHER_ERROR".to_string());
        let message = self
            .message
            .as_deref()
            .map(decode_hex_message)
            .unwrap_or_else(|| "Unknown error".to_string());
        NodeError::rejection(&code, &message)
    }
}

/// `/wallet/broadcasttransaction` response
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastResponse {
    #[serde(default)]
    pub result: Option<bool>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `/wallet/getaccount` response. An unknown account is `{}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountJson {
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub balance: i64,
    #[serde(default)]
    pub owner_permission: Option<Permission>,
    #[serde(default)]
    pub witness_permission: Option<Permission>,
    #[serde(default)]
    pub active_permission: Vec<Permission>,
}

/// `/wallet/triggerconstantcontract` response
#[derive(Debug, Clone, Deserialize)]
pub struct ConstantCallResponse {
    #[serde(default)]
    pub result: ReturnJson,
    #[serde(default)]
    pub constant_result: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiptJson {
    #[serde(default)]
    pub result: Option<String>,
}

/// `/wallet/gettransactioninfobyid` response. An unknown id is `{}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfoJson {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub block_number: Option<i64>,
    #[serde(default)]
    pub receipt: Option<ReceiptJson>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub res_message: Option<String>,
}

/// Extract the transaction from a transaction-creating endpoint.
///
/// Nodes answer with the transaction at the root (`createtransaction`),
/// nested under `transaction` (`triggersmartcontract`), or with an error as
/// `{"Error": ..}` or `{"result":{"result":false,..}}`.
pub fn parse_transaction_response(response: Value) -> Result<TransactionJson, NodeError> {
    if let Some(error) = response.get("Error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(NodeError::rejection("Error", &message));
    }

    if let Some(result) = response.get("result").filter(|r| r.is_object()) {
        let result: ReturnJson = serde_json::from_value(result.clone())
            .map_err(|e| NodeError::InvalidResponse(e.to_string()))?;
        if !result.result {
            return Err(result.into_error());
        }
    }

    let transaction = match response.get("transaction") {
        Some(tx) => tx.clone(),
        None if response.get("txID").is_some() => response,
        None => {
            return Err(NodeError::InvalidResponse(format!(
                "no transaction in response: {}",
                response
            )))
        }
    };

    serde_json::from_value(transaction).map_err(|e| NodeError::InvalidResponse(e.to_string()))
}

/// Interpret a broadcast response; success yields the node's txid
pub fn parse_broadcast_response(response: BroadcastResponse) -> Result<String, NodeError> {
    if response.result == Some(true) {
        return response
            .txid
            .ok_or_else(|| NodeError::InvalidResponse("broadcast result without txid".to_string()));
    }

    let code = response.code.unwrap_or_else(|| "OTHER_ERROR".to_string());
    let message = response
        .message
        .as_deref()
        .map(decode_hex_message)
        .unwrap_or_else(|| "Unknown error".to_string());
    Err(NodeError::rejection(&code, &message))
}

/// Interpret a constant call response as the list of returned ABI words
pub fn parse_constant_response(response: ConstantCallResponse) -> Result<Vec<Vec<u8>>, NodeError> {
    if !response.result.result {
        return Err(response.result.into_error());
    }
    response
        .constant_result
        .iter()
        .map(|r| hex::decode(r).map_err(|e| NodeError::InvalidResponse(e.to_string())))
        .collect()
}
