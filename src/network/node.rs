//! Chain node port
//!
//! The engine only ever talks to a node through [`ChainNode`]; the HTTP
//! implementation lives in `client`, tests plug in an in-memory one.

use async_trait::async_trait;
use serde::Serialize;

use super::message::{AccountJson, NodeError, TransactionInfoJson};
use crate::core::encoding::{is_zero_i32, is_zero_i64};
use crate::core::{Permission, Transaction, TransactionJson, TxId};
use crate::crypto::Address;

/// `/wallet/createtransaction` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub owner_address: Address,
    pub to_address: Address,
    pub amount: i64,
    #[serde(rename = "Permission_id", skip_serializing_if = "is_zero_i32")]
    pub permission_id: i32,
}

/// `/wallet/triggersmartcontract` and `/wallet/triggerconstantcontract` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerRequest {
    pub owner_address: Address,
    pub contract_address: Address,
    pub function_selector: String,
    /// Hex of the ABI-encoded arguments
    pub parameter: String,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub fee_limit: i64,
    #[serde(skip_serializing_if = "is_zero_i64")]
    pub call_value: i64,
    #[serde(rename = "Permission_id", skip_serializing_if = "is_zero_i32")]
    pub permission_id: i32,
}

/// `/wallet/accountpermissionupdate` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionUpdateRequest {
    pub owner_address: Address,
    pub owner: Permission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<Permission>,
    pub actives: Vec<Permission>,
}

/// An account's balance and permission structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: Address,
    pub balance: i64,
    pub owner_permission: Permission,
    pub witness_permission: Option<Permission>,
    pub active_permissions: Vec<Permission>,
}

impl AccountInfo {
    /// Convert a `getaccount` response. Accounts that never changed their
    /// permissions carry no `owner_permission`; they get the implicit
    /// single-key owner.
    pub fn from_json(address: Address, json: AccountJson) -> Result<Self, NodeError> {
        if json.address.is_none() {
            return Err(NodeError::AccountNotFound(address));
        }
        Ok(Self {
            address,
            balance: json.balance,
            owner_permission: json
                .owner_permission
                .unwrap_or_else(|| Permission::default_owner(address)),
            witness_permission: json.witness_permission,
            active_permissions: json.active_permission,
        })
    }

    /// Look up a permission by id
    pub fn permission(&self, id: i32) -> Option<&Permission> {
        if id == self.owner_permission.id {
            return Some(&self.owner_permission);
        }
        self.witness_permission
            .iter()
            .chain(self.active_permissions.iter())
            .find(|p| p.id == id)
    }
}

/// On-chain execution result of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub tx_id: TxId,
    pub block_number: i64,
    pub success: bool,
    /// Decoded failure message
    pub message: Option<String>,
}

impl TransactionInfo {
    /// Convert a `gettransactioninfobyid` response; `None` while unknown
    pub fn from_json(tx_id: TxId, json: TransactionInfoJson) -> Option<Self> {
        json.id.as_ref()?;

        let failed = json.result.as_deref() == Some("FAILED")
            || json
                .receipt
                .as_ref()
                .and_then(|r| r.result.as_deref())
                .map(|r| r != "SUCCESS")
                .unwrap_or(false);

        Some(Self {
            tx_id,
            block_number: json.block_number.unwrap_or(0),
            success: !failed,
            message: json
                .res_message
                .as_deref()
                .map(super::message::decode_hex_message),
        })
    }
}

/// Operations the engine needs from a chain node
#[async_trait]
pub trait ChainNode: Send + Sync {
    /// Unsigned native transfer envelope
    async fn create_transaction(&self, request: &TransferRequest)
        -> Result<TransactionJson, NodeError>;

    /// Unsigned smart contract call envelope
    async fn trigger_smart_contract(
        &self,
        request: &TriggerRequest,
    ) -> Result<TransactionJson, NodeError>;

    /// Unsigned permission update envelope
    async fn account_permission_update(
        &self,
        request: &PermissionUpdateRequest,
    ) -> Result<TransactionJson, NodeError>;

    async fn get_account(&self, address: &Address) -> Result<AccountInfo, NodeError>;

    /// Read-only contract call; returns the raw result words
    async fn trigger_constant_contract(
        &self,
        request: &TriggerRequest,
    ) -> Result<Vec<Vec<u8>>, NodeError>;

    /// Submit a signed transaction; returns the id the node accepted
    async fn broadcast_transaction(&self, transaction: &Transaction) -> Result<TxId, NodeError>;

    /// Execution result, `None` until the transaction is in a block
    async fn get_transaction_info(&self, tx_id: &TxId)
        -> Result<Option<TransactionInfo>, NodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PermissionKey;
    use crate::crypto::KeyPair;

    #[test]
    fn test_transfer_request_json() {
        let owner = KeyPair::generate().address();
        let to = KeyPair::generate().address();
        let request = TransferRequest {
            owner_address: owner,
            to_address: to,
            amount: 1_000_000,
            permission_id: 2,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["owner_address"], owner.to_hex());
        assert_eq!(json["amount"], 1_000_000);
        assert_eq!(json["Permission_id"], 2);

        let owner_only = TransferRequest {
            permission_id: 0,
            ..request
        };
        let json = serde_json::to_value(&owner_only).unwrap();
        assert!(json.get("Permission_id").is_none());
    }

    #[test]
    fn test_account_defaults_owner_permission() {
        let address = KeyPair::generate().address();
        let json: AccountJson = serde_json::from_value(serde_json::json!({
            "address": address.to_hex(),
            "balance": 42
        }))
        .unwrap();

        let account = AccountInfo::from_json(address, json).unwrap();
        assert_eq!(account.balance, 42);
        assert_eq!(account.owner_permission, Permission::default_owner(address));
        assert_eq!(account.permission(0), Some(&account.owner_permission));
        assert!(account.permission(2).is_none());
    }

    #[test]
    fn test_account_not_found() {
        let address = KeyPair::generate().address();
        assert_eq!(
            AccountInfo::from_json(address, AccountJson::default()).unwrap_err(),
            NodeError::AccountNotFound(address)
        );
    }

    #[test]
    fn test_account_permission_lookup() {
        let address = KeyPair::generate().address();
        let key = PermissionKey::new(address, 1);
        let account = AccountInfo {
            address,
            balance: 0,
            owner_permission: Permission::owner(1, vec![key.clone()]),
            witness_permission: None,
            active_permissions: vec![Permission::active(
                3,
                "ops",
                1,
                vec![key],
                &[crate::core::ContractType::Transfer],
            )],
        };
        assert_eq!(account.permission(3).map(|p| p.name.as_str()), Some("ops"));
    }

    #[test]
    fn test_transaction_info_states() {
        let tx_id: TxId = "11".repeat(32).parse().unwrap();

        let unknown = TransactionInfoJson::default();
        assert!(TransactionInfo::from_json(tx_id, unknown).is_none());

        let ok: TransactionInfoJson = serde_json::from_value(serde_json::json!({
            "id": tx_id.to_hex(), "blockNumber": 100, "receipt": {"net_usage": 268}
        }))
        .unwrap();
        let info = TransactionInfo::from_json(tx_id, ok).unwrap();
        assert!(info.success);
        assert_eq!(info.block_number, 100);

        let failed: TransactionInfoJson = serde_json::from_value(serde_json::json!({
            "id": tx_id.to_hex(), "blockNumber": 101, "result": "FAILED",
            "resMessage": "5245564552540a", "receipt": {"result": "REVERT"}
        }))
        .unwrap();
        let info = TransactionInfo::from_json(tx_id, failed).unwrap();
        assert!(!info.success);
        assert_eq!(info.message.as_deref(), Some("REVERT\n"));
    }
}
