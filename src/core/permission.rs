//! Account permission structure
//!
//! A permission binds a weighted set of addresses and a threshold to an
//! authority level on an account. The JSON shape matches what nodes return
//! from `getaccount` and accept in `accountpermissionupdate`.

use serde::{Deserialize, Serialize};

use super::contract::ContractType;
use super::encoding::{is_zero_i32, opt_hex_bytes};
use crate::crypto::Address;

/// Size of the operations bitmap in bytes (256 contract type slots)
pub const OPERATIONS_LEN: usize = 32;

/// Permission id of the owner permission
pub const OWNER_PERMISSION_ID: i32 = 0;

/// Permission id of the witness permission
pub const WITNESS_PERMISSION_ID: i32 = 1;

/// First id assigned to active permissions
pub const FIRST_ACTIVE_PERMISSION_ID: i32 = 2;

/// Authority level of a permission
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionKind {
    #[default]
    Owner,
    Witness,
    Active,
}

impl PermissionKind {
    /// Protobuf enum value
    pub fn code(self) -> u64 {
        match self {
            PermissionKind::Owner => 0,
            PermissionKind::Witness => 1,
            PermissionKind::Active => 2,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(PermissionKind::Owner),
            1 => Some(PermissionKind::Witness),
            2 => Some(PermissionKind::Active),
            _ => None,
        }
    }
}

/// One weighted key of a permission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionKey {
    pub address: Address,
    pub weight: i64,
}

impl PermissionKey {
    pub fn new(address: Address, weight: i64) -> Self {
        Self { address, weight }
    }
}

/// A permission: who may authorize, with what weight, above which threshold
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "type", default)]
    pub kind: PermissionKind,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub id: i32,
    #[serde(rename = "permission_name", default)]
    pub name: String,
    pub threshold: i64,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub parent_id: i32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "opt_hex_bytes"
    )]
    pub operations: Option<Vec<u8>>,
    pub keys: Vec<PermissionKey>,
}

impl Permission {
    /// Owner permission (id 0); may authorize every contract type
    pub fn owner(threshold: i64, keys: Vec<PermissionKey>) -> Self {
        Self {
            kind: PermissionKind::Owner,
            id: OWNER_PERMISSION_ID,
            name: "owner".to_string(),
            threshold,
            parent_id: 0,
            operations: None,
            keys,
        }
    }

    /// Active permission limited to the given contract types
    pub fn active(
        id: i32,
        name: &str,
        threshold: i64,
        keys: Vec<PermissionKey>,
        allowed: &[ContractType],
    ) -> Self {
        Self {
            kind: PermissionKind::Active,
            id,
            name: name.to_string(),
            threshold,
            parent_id: 0,
            operations: Some(operations_bitmap(allowed)),
            keys,
        }
    }

    /// Witness permission (id 1)
    pub fn witness(threshold: i64, keys: Vec<PermissionKey>) -> Self {
        Self {
            kind: PermissionKind::Witness,
            id: WITNESS_PERMISSION_ID,
            name: "witness".to_string(),
            threshold,
            parent_id: 0,
            operations: None,
            keys,
        }
    }

    /// The single-key owner permission every fresh account implicitly has
    pub fn default_owner(address: Address) -> Self {
        Self::owner(1, vec![PermissionKey::new(address, 1)])
    }

    /// Sum of all key weights
    pub fn total_weight(&self) -> i64 {
        self.keys.iter().map(|k| k.weight).sum()
    }

    /// Get description like "2-of-3 (weight 3)"
    pub fn description(&self) -> String {
        format!(
            "{}-of-{} (weight {})",
            self.threshold,
            self.keys.len(),
            self.total_weight()
        )
    }
}

/// Build an operations bitmap allowing exactly the given contract types.
/// Contract type `n` is bit `n % 8` of byte `n / 8`.
pub fn operations_bitmap(allowed: &[ContractType]) -> Vec<u8> {
    let mut bitmap = vec![0u8; OPERATIONS_LEN];
    for contract_type in allowed {
        let code = contract_type.code() as usize;
        bitmap[code / 8] |= 1 << (code % 8);
    }
    bitmap
}

/// Check one contract type against an operations bitmap
pub fn operations_allow(bitmap: &[u8], contract_type: ContractType) -> bool {
    let code = contract_type.code() as usize;
    bitmap
        .get(code / 8)
        .map(|byte| byte & (1 << (code % 8)) != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_operations_bitmap() {
        let bitmap = operations_bitmap(&[
            ContractType::Transfer,
            ContractType::TriggerSmartContract,
            ContractType::AccountPermissionUpdate,
        ]);
        assert_eq!(bitmap.len(), OPERATIONS_LEN);
        assert_eq!(bitmap[0], 0x02);
        assert_eq!(bitmap[3], 0x80);
        assert_eq!(bitmap[5], 0x40);

        assert!(operations_allow(&bitmap, ContractType::Transfer));
        let transfers_only = operations_bitmap(&[ContractType::Transfer]);
        assert!(!operations_allow(
            &transfers_only,
            ContractType::TriggerSmartContract
        ));
    }

    #[test]
    fn test_owner_permission_json_without_type() {
        let address = KeyPair::generate().address();
        let json = format!(
            r#"{{"permission_name":"owner","threshold":1,"keys":[{{"address":"{}","weight":1}}]}}"#,
            address.to_hex()
        );
        let permission: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(permission.kind, PermissionKind::Owner);
        assert_eq!(permission.id, 0);
        assert_eq!(permission, Permission::default_owner(address));
    }

    #[test]
    fn test_active_permission_json() {
        let address = KeyPair::generate().address();
        let json = format!(
            r#"{{"type":"Active","id":2,"permission_name":"active","threshold":2,
                "operations":"7fff1fc0033e0000000000000000000000000000000000000000000000000000",
                "keys":[{{"address":"{}","weight":2}}]}}"#,
            address.to_hex()
        );
        let permission: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(permission.kind, PermissionKind::Active);
        assert_eq!(permission.id, 2);
        assert_eq!(permission.operations.as_ref().map(Vec::len), Some(32));
        assert_eq!(permission.total_weight(), 2);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"type":"Root","threshold":1,"keys":[]}"#;
        assert!(serde_json::from_str::<Permission>(json).is_err());
    }
}
