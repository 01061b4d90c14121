//! Contract payloads carried by a transaction
//!
//! Every transaction holds exactly one contract call: a type tag plus a
//! typed payload. Node JSON wraps the payload as
//! `{"parameter":{"value":{..},"type_url":".."},"type":"..","Permission_id":n}`
//! and parsing is exhaustive: an unrecognized type name is an error, never
//! a silently defaulted payload.

use serde::{Deserialize, Serialize};

use super::encoding::{hex_bytes, is_zero_i32, is_zero_i64};
use super::permission::Permission;
use super::wire::WireError;
use crate::crypto::Address;

/// Prefix of every `google.protobuf.Any` type url for chain contracts
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/protocol.";

/// Contract types this engine can encode, decode and sign
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    Transfer,
    TriggerSmartContract,
    AccountPermissionUpdate,
}

impl ContractType {
    /// Protobuf `ContractType` enum value
    pub fn code(self) -> u64 {
        match self {
            ContractType::Transfer => 1,
            ContractType::TriggerSmartContract => 31,
            ContractType::AccountPermissionUpdate => 46,
        }
    }

    /// Name used in the JSON `type` field and in the type url
    pub fn name(self) -> &'static str {
        match self {
            ContractType::Transfer => "TransferContract",
            ContractType::TriggerSmartContract => "TriggerSmartContract",
            ContractType::AccountPermissionUpdate => "AccountPermissionUpdateContract",
        }
    }

    pub fn type_url(self) -> String {
        format!("{}{}", TYPE_URL_PREFIX, self.name())
    }

    pub fn from_code(code: u64) -> Result<Self, WireError> {
        match code {
            1 => Ok(ContractType::Transfer),
            31 => Ok(ContractType::TriggerSmartContract),
            46 => Ok(ContractType::AccountPermissionUpdate),
            other => Err(WireError::UnsupportedContractType(format!("code {}", other))),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, WireError> {
        match name {
            "TransferContract" => Ok(ContractType::Transfer),
            "TriggerSmartContract" => Ok(ContractType::TriggerSmartContract),
            "AccountPermissionUpdateContract" => Ok(ContractType::AccountPermissionUpdate),
            other => Err(WireError::UnsupportedContractType(other.to_string())),
        }
    }
}

/// Native asset transfer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferContract {
    pub owner_address: Address,
    pub to_address: Address,
    pub amount: i64,
}

/// Smart contract call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSmartContract {
    pub owner_address: Address,
    pub contract_address: Address,
    /// Native amount sent with the call; zero is never put on the wire
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub call_value: i64,
    #[serde(default, with = "hex_bytes")]
    pub data: Vec<u8>,
}

/// Replacement of an account's permission structure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPermissionUpdateContract {
    pub owner_address: Address,
    pub owner: Permission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Permission>,
    pub actives: Vec<Permission>,
}

/// Typed contract payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractParameter {
    Transfer(TransferContract),
    TriggerSmartContract(TriggerSmartContract),
    AccountPermissionUpdate(AccountPermissionUpdateContract),
}

impl ContractParameter {
    pub fn contract_type(&self) -> ContractType {
        match self {
            ContractParameter::Transfer(_) => ContractType::Transfer,
            ContractParameter::TriggerSmartContract(_) => ContractType::TriggerSmartContract,
            ContractParameter::AccountPermissionUpdate(_) => ContractType::AccountPermissionUpdate,
        }
    }

    /// Account whose permission authorizes the call
    pub fn owner_address(&self) -> &Address {
        match self {
            ContractParameter::Transfer(c) => &c.owner_address,
            ContractParameter::TriggerSmartContract(c) => &c.owner_address,
            ContractParameter::AccountPermissionUpdate(c) => &c.owner_address,
        }
    }
}

/// The single contract call of a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ContractJson", into = "ContractJson")]
pub struct ContractCall {
    pub parameter: ContractParameter,
    /// Account permission authorizing this call (0 = owner)
    pub permission_id: i32,
}

impl ContractCall {
    pub fn new(parameter: ContractParameter, permission_id: i32) -> Self {
        Self {
            parameter,
            permission_id,
        }
    }

    pub fn contract_type(&self) -> ContractType {
        self.parameter.contract_type()
    }
}

/// Node JSON form of a contract call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractJson {
    pub parameter: ParameterJson,
    #[serde(rename = "type")]
    pub contract_type: String,
    #[serde(
        rename = "Permission_id",
        default,
        skip_serializing_if = "is_zero_i32"
    )]
    pub permission_id: i32,
}

/// Node JSON form of a `google.protobuf.Any`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterJson {
    pub value: serde_json::Value,
    pub type_url: String,
}

impl TryFrom<ContractJson> for ContractCall {
    type Error = WireError;

    fn try_from(json: ContractJson) -> Result<Self, Self::Error> {
        let contract_type = ContractType::from_name(&json.contract_type)?;
        if json.parameter.type_url != contract_type.type_url() {
            return Err(WireError::InvalidContract(format!(
                "type url {} does not match {}",
                json.parameter.type_url,
                contract_type.name()
            )));
        }

        let value = json.parameter.value;
        let invalid = |e: serde_json::Error| WireError::Json(e.to_string());
        let parameter = match contract_type {
            ContractType::Transfer => {
                ContractParameter::Transfer(serde_json::from_value(value).map_err(invalid)?)
            }
            ContractType::TriggerSmartContract => ContractParameter::TriggerSmartContract(
                serde_json::from_value(value).map_err(invalid)?,
            ),
            ContractType::AccountPermissionUpdate => ContractParameter::AccountPermissionUpdate(
                serde_json::from_value(value).map_err(invalid)?,
            ),
        };

        Ok(ContractCall::new(parameter, json.permission_id))
    }
}

impl From<ContractCall> for ContractJson {
    fn from(call: ContractCall) -> Self {
        let contract_type = call.contract_type();
        // Serializing these plain structs cannot fail
        let value = match &call.parameter {
            ContractParameter::Transfer(c) => serde_json::to_value(c),
            ContractParameter::TriggerSmartContract(c) => serde_json::to_value(c),
            ContractParameter::AccountPermissionUpdate(c) => serde_json::to_value(c),
        }
        .unwrap_or(serde_json::Value::Null);

        ContractJson {
            parameter: ParameterJson {
                value,
                type_url: contract_type.type_url(),
            },
            contract_type: contract_type.name().to_string(),
            permission_id: call.permission_id,
        }
    }
}
