//! Wire encoding of raw transaction data
//!
//! Produces the exact protobuf bytes the chain hashes and verifies. Each
//! field is `key = field_number << 3 | wire_type`, followed by a base-128
//! varint or, for length-delimited fields, a varint length and the payload.
//! Fields are always written in ascending field-number order and zero
//! scalars / empty byte strings are omitted, so one logical transaction has
//! exactly one encoding.
//!
//! Only [`encode`] and [`decode`] are public; nothing above this module
//! depends on how the bytes are produced.

use thiserror::Error;

use super::contract::{
    AccountPermissionUpdateContract, ContractCall, ContractParameter, ContractType,
    TransferContract, TriggerSmartContract,
};
use super::permission::{Permission, PermissionKey, PermissionKind};
use super::raw::RawTransactionData;
use crate::crypto::Address;

const WIRE_VARINT: u8 = 0;
const WIRE_LEN: u8 = 2;

// raw
const RAW_REF_BLOCK_BYTES: u32 = 1;
const RAW_REF_BLOCK_NUM: u32 = 3;
const RAW_REF_BLOCK_HASH: u32 = 4;
const RAW_EXPIRATION: u32 = 8;
const RAW_DATA: u32 = 10;
const RAW_CONTRACT: u32 = 11;
const RAW_TIMESTAMP: u32 = 14;
const RAW_FEE_LIMIT: u32 = 18;

// Transaction.Contract
const CONTRACT_TYPE: u32 = 1;
const CONTRACT_PARAMETER: u32 = 2;
const CONTRACT_PERMISSION_ID: u32 = 5;

// google.protobuf.Any
const ANY_TYPE_URL: u32 = 1;
const ANY_VALUE: u32 = 2;

/// Encoding and decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Unsupported contract type: {0}")]
    UnsupportedContractType(String),
    #[error("Truncated input")]
    Truncated,
    #[error("Varint exceeds 64 bits")]
    VarintOverflow,
    #[error("Unsupported wire type {wire_type} for field {field}")]
    UnsupportedWireType { field: u32, wire_type: u8 },
    #[error("Field {field} of {message} has wrong wire type {found}")]
    WireTypeMismatch {
        message: &'static str,
        field: u32,
        found: u8,
    },
    #[error("Unexpected field {field} in {message}")]
    UnexpectedField { message: &'static str, field: u32 },
    #[error("Missing field {field} in {message}")]
    MissingField { message: &'static str, field: u32 },
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid contract: {0}")]
    InvalidContract(String),
    #[error("Invalid expiration: {0}")]
    InvalidExpiration(String),
    #[error("Invalid JSON: {0}")]
    Json(String),
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Transaction id mismatch: claimed {claimed}, computed {computed}")]
    IdentityMismatch { claimed: String, computed: String },
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode raw transaction data into its canonical wire bytes
pub fn encode(raw: &RawTransactionData) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    put_bytes(&mut buf, RAW_REF_BLOCK_BYTES, &raw.ref_block_bytes);
    put_varint(&mut buf, RAW_REF_BLOCK_NUM, raw.ref_block_num);
    put_bytes(&mut buf, RAW_REF_BLOCK_HASH, &raw.ref_block_hash);
    put_varint(&mut buf, RAW_EXPIRATION, raw.expiration);
    put_bytes(&mut buf, RAW_DATA, &raw.data);
    put_message(&mut buf, RAW_CONTRACT, &encode_contract(&raw.contract));
    put_varint(&mut buf, RAW_TIMESTAMP, raw.timestamp);
    put_varint(&mut buf, RAW_FEE_LIMIT, raw.fee_limit);
    buf
}

fn encode_contract(call: &ContractCall) -> Vec<u8> {
    let contract_type = call.contract_type();
    let value = match &call.parameter {
        ContractParameter::Transfer(c) => encode_transfer(c),
        ContractParameter::TriggerSmartContract(c) => encode_trigger(c),
        ContractParameter::AccountPermissionUpdate(c) => encode_permission_update(c),
    };

    let mut any = Vec::new();
    put_bytes(&mut any, ANY_TYPE_URL, contract_type.type_url().as_bytes());
    put_bytes(&mut any, ANY_VALUE, &value);

    let mut buf = Vec::new();
    put_varint(&mut buf, CONTRACT_TYPE, contract_type.code() as i64);
    put_message(&mut buf, CONTRACT_PARAMETER, &any);
    put_varint(&mut buf, CONTRACT_PERMISSION_ID, i64::from(call.permission_id));
    buf
}

fn encode_transfer(c: &TransferContract) -> Vec<u8> {
    let mut buf = Vec::new();
    put_bytes(&mut buf, 1, c.owner_address.as_bytes());
    put_bytes(&mut buf, 2, c.to_address.as_bytes());
    put_varint(&mut buf, 3, c.amount);
    buf
}

fn encode_trigger(c: &TriggerSmartContract) -> Vec<u8> {
    let mut buf = Vec::new();
    put_bytes(&mut buf, 1, c.owner_address.as_bytes());
    put_bytes(&mut buf, 2, c.contract_address.as_bytes());
    // A zero call_value is never emitted; verifiers hash it that way
    put_varint(&mut buf, 3, c.call_value);
    put_bytes(&mut buf, 4, &c.data);
    buf
}

fn encode_permission_update(c: &AccountPermissionUpdateContract) -> Vec<u8> {
    let mut buf = Vec::new();
    put_bytes(&mut buf, 1, c.owner_address.as_bytes());
    put_message(&mut buf, 2, &encode_permission(&c.owner));
    if let Some(witness) = &c.witness {
        put_message(&mut buf, 3, &encode_permission(witness));
    }
    for active in &c.actives {
        put_message(&mut buf, 4, &encode_permission(active));
    }
    buf
}

fn encode_permission(p: &Permission) -> Vec<u8> {
    let mut buf = Vec::new();
    put_varint(&mut buf, 1, p.kind.code() as i64);
    put_varint(&mut buf, 2, i64::from(p.id));
    put_bytes(&mut buf, 3, p.name.as_bytes());
    put_varint(&mut buf, 4, p.threshold);
    put_varint(&mut buf, 5, i64::from(p.parent_id));
    if let Some(operations) = &p.operations {
        put_bytes(&mut buf, 6, operations);
    }
    for key in &p.keys {
        let mut key_buf = Vec::new();
        put_bytes(&mut key_buf, 1, key.address.as_bytes());
        put_varint(&mut key_buf, 2, key.weight);
        put_message(&mut buf, 7, &key_buf);
    }
    buf
}

fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn put_key(buf: &mut Vec<u8>, field: u32, wire_type: u8) {
    encode_varint((u64::from(field) << 3) | u64::from(wire_type), buf);
}

/// Scalar field; zero is omitted. Negative values take the 10-byte
/// two's-complement form, as protobuf `int64` does.
fn put_varint(buf: &mut Vec<u8>, field: u32, value: i64) {
    if value != 0 {
        put_key(buf, field, WIRE_VARINT);
        encode_varint(value as u64, buf);
    }
}

/// Bytes/string field; empty is omitted
fn put_bytes(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    if !bytes.is_empty() {
        put_message(buf, field, bytes);
    }
}

/// Embedded message; always written, even when empty
fn put_message(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_key(buf, field, WIRE_LEN);
    encode_varint(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode canonical wire bytes back into raw transaction data
pub fn decode(bytes: &[u8]) -> Result<RawTransactionData, WireError> {
    const MSG: &str = "raw";
    let mut reader = Reader::new(bytes);

    let mut ref_block_bytes = Vec::new();
    let mut ref_block_num = 0;
    let mut ref_block_hash = Vec::new();
    let mut expiration = 0;
    let mut data = Vec::new();
    let mut contract = None;
    let mut timestamp = 0;
    let mut fee_limit = 0;

    while let Some((field, value)) = reader.next_field()? {
        match field {
            RAW_REF_BLOCK_BYTES => ref_block_bytes = value.bytes(MSG, field)?.to_vec(),
            RAW_REF_BLOCK_NUM => ref_block_num = value.varint(MSG, field)? as i64,
            RAW_REF_BLOCK_HASH => ref_block_hash = value.bytes(MSG, field)?.to_vec(),
            RAW_EXPIRATION => expiration = value.varint(MSG, field)? as i64,
            RAW_DATA => data = value.bytes(MSG, field)?.to_vec(),
            RAW_CONTRACT => {
                if contract.is_some() {
                    return Err(WireError::InvalidContract(
                        "more than one contract".to_string(),
                    ));
                }
                contract = Some(decode_contract(value.bytes(MSG, field)?)?);
            }
            RAW_TIMESTAMP => timestamp = value.varint(MSG, field)? as i64,
            RAW_FEE_LIMIT => fee_limit = value.varint(MSG, field)? as i64,
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    Ok(RawTransactionData {
        ref_block_bytes,
        ref_block_num,
        ref_block_hash,
        expiration,
        data,
        contract: contract.ok_or(WireError::MissingField {
            message: MSG,
            field: RAW_CONTRACT,
        })?,
        timestamp,
        fee_limit,
    })
}

fn decode_contract(bytes: &[u8]) -> Result<ContractCall, WireError> {
    const MSG: &str = "Contract";
    let mut reader = Reader::new(bytes);

    let mut type_code = None;
    let mut parameter = None;
    let mut permission_id = 0;

    while let Some((field, value)) = reader.next_field()? {
        match field {
            CONTRACT_TYPE => type_code = Some(value.varint(MSG, field)?),
            CONTRACT_PARAMETER => parameter = Some(value.bytes(MSG, field)?),
            CONTRACT_PERMISSION_ID => permission_id = value.varint(MSG, field)? as i32,
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    // An absent type is the proto3 default 0, which is not a supported contract
    let contract_type = ContractType::from_code(type_code.unwrap_or(0))?;
    let any = parameter.ok_or(WireError::MissingField {
        message: MSG,
        field: CONTRACT_PARAMETER,
    })?;
    let value = decode_any(any, contract_type)?;

    let parameter = match contract_type {
        ContractType::Transfer => ContractParameter::Transfer(decode_transfer(value)?),
        ContractType::TriggerSmartContract => {
            ContractParameter::TriggerSmartContract(decode_trigger(value)?)
        }
        ContractType::AccountPermissionUpdate => {
            ContractParameter::AccountPermissionUpdate(decode_permission_update(value)?)
        }
    };

    Ok(ContractCall::new(parameter, permission_id))
}

fn decode_any(bytes: &[u8], expected: ContractType) -> Result<&[u8], WireError> {
    const MSG: &str = "Any";
    let mut reader = Reader::new(bytes);
    let mut type_url = "";
    let mut value: &[u8] = &[];

    while let Some((field, v)) = reader.next_field()? {
        match field {
            ANY_TYPE_URL => {
                type_url = std::str::from_utf8(v.bytes(MSG, field)?)
                    .map_err(|_| WireError::InvalidContract("type url is not UTF-8".to_string()))?
            }
            ANY_VALUE => value = v.bytes(MSG, field)?,
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    if type_url != expected.type_url() {
        return Err(WireError::InvalidContract(format!(
            "type url {} does not match {}",
            type_url,
            expected.name()
        )));
    }
    Ok(value)
}

fn decode_transfer(bytes: &[u8]) -> Result<TransferContract, WireError> {
    const MSG: &str = "TransferContract";
    let mut reader = Reader::new(bytes);
    let mut owner = None;
    let mut to = None;
    let mut amount = 0;

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => owner = Some(address(value.bytes(MSG, field)?)?),
            2 => to = Some(address(value.bytes(MSG, field)?)?),
            3 => amount = value.varint(MSG, field)? as i64,
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    Ok(TransferContract {
        owner_address: required(owner, MSG, 1)?,
        to_address: required(to, MSG, 2)?,
        amount,
    })
}

fn decode_trigger(bytes: &[u8]) -> Result<TriggerSmartContract, WireError> {
    const MSG: &str = "TriggerSmartContract";
    let mut reader = Reader::new(bytes);
    let mut owner = None;
    let mut contract = None;
    let mut call_value = 0;
    let mut data = Vec::new();

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => owner = Some(address(value.bytes(MSG, field)?)?),
            2 => contract = Some(address(value.bytes(MSG, field)?)?),
            3 => call_value = value.varint(MSG, field)? as i64,
            4 => data = value.bytes(MSG, field)?.to_vec(),
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    Ok(TriggerSmartContract {
        owner_address: required(owner, MSG, 1)?,
        contract_address: required(contract, MSG, 2)?,
        call_value,
        data,
    })
}

fn decode_permission_update(bytes: &[u8]) -> Result<AccountPermissionUpdateContract, WireError> {
    const MSG: &str = "AccountPermissionUpdateContract";
    let mut reader = Reader::new(bytes);
    let mut owner_address = None;
    let mut owner = None;
    let mut witness = None;
    let mut actives = Vec::new();

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => owner_address = Some(address(value.bytes(MSG, field)?)?),
            2 => owner = Some(decode_permission(value.bytes(MSG, field)?)?),
            3 => witness = Some(decode_permission(value.bytes(MSG, field)?)?),
            4 => actives.push(decode_permission(value.bytes(MSG, field)?)?),
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    Ok(AccountPermissionUpdateContract {
        owner_address: required(owner_address, MSG, 1)?,
        owner: required(owner, MSG, 2)?,
        witness,
        actives,
    })
}

fn decode_permission(bytes: &[u8]) -> Result<Permission, WireError> {
    const MSG: &str = "Permission";
    let mut reader = Reader::new(bytes);
    let mut permission = Permission {
        kind: PermissionKind::Owner,
        id: 0,
        name: String::new(),
        threshold: 0,
        parent_id: 0,
        operations: None,
        keys: Vec::new(),
    };

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => {
                let code = value.varint(MSG, field)?;
                permission.kind = PermissionKind::from_code(code).ok_or_else(|| {
                    WireError::InvalidContract(format!("unknown permission type {}", code))
                })?;
            }
            2 => permission.id = value.varint(MSG, field)? as i32,
            3 => {
                permission.name = String::from_utf8(value.bytes(MSG, field)?.to_vec())
                    .map_err(|_| {
                        WireError::InvalidContract("permission name is not UTF-8".to_string())
                    })?
            }
            4 => permission.threshold = value.varint(MSG, field)? as i64,
            5 => permission.parent_id = value.varint(MSG, field)? as i32,
            6 => permission.operations = Some(value.bytes(MSG, field)?.to_vec()),
            7 => permission.keys.push(decode_key(value.bytes(MSG, field)?)?),
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    Ok(permission)
}

fn decode_key(bytes: &[u8]) -> Result<PermissionKey, WireError> {
    const MSG: &str = "Key";
    let mut reader = Reader::new(bytes);
    let mut key_address = None;
    let mut weight = 0;

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => key_address = Some(address(value.bytes(MSG, field)?)?),
            2 => weight = value.varint(MSG, field)? as i64,
            _ => return Err(WireError::UnexpectedField { message: MSG, field }),
        }
    }

    Ok(PermissionKey {
        address: required(key_address, MSG, 1)?,
        weight,
    })
}

fn address(bytes: &[u8]) -> Result<Address, WireError> {
    Address::from_bytes(bytes).map_err(|e| WireError::InvalidAddress(e.to_string()))
}

fn required<T>(value: Option<T>, message: &'static str, field: u32) -> Result<T, WireError> {
    value.ok_or(WireError::MissingField { message, field })
}

/// A decoded field value
enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
}

impl<'a> FieldValue<'a> {
    fn varint(&self, message: &'static str, field: u32) -> Result<u64, WireError> {
        match self {
            FieldValue::Varint(v) => Ok(*v),
            FieldValue::Bytes(_) => Err(WireError::WireTypeMismatch {
                message,
                field,
                found: WIRE_LEN,
            }),
        }
    }

    fn bytes(&self, message: &'static str, field: u32) -> Result<&'a [u8], WireError> {
        match self {
            FieldValue::Bytes(b) => Ok(b),
            FieldValue::Varint(_) => Err(WireError::WireTypeMismatch {
                message,
                field,
                found: WIRE_VARINT,
            }),
        }
    }
}

/// Cursor over a protobuf message
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_varint(&mut self) -> Result<u64, WireError> {
        let mut result = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self.buf.get(self.pos).ok_or(WireError::Truncated)?;
            self.pos += 1;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(WireError::VarintOverflow)
    }

    fn read_bytes(&mut self) -> Result<&'a [u8], WireError> {
        let len = usize::try_from(self.read_varint()?).map_err(|_| WireError::Truncated)?;
        let end = self.pos.checked_add(len).ok_or(WireError::Truncated)?;
        let bytes = self.buf.get(self.pos..end).ok_or(WireError::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    fn next_field(&mut self) -> Result<Option<(u32, FieldValue<'a>)>, WireError> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }

        let key = self.read_varint()?;
        let field = u32::try_from(key >> 3).map_err(|_| WireError::VarintOverflow)?;
        let wire_type = (key & 0x07) as u8;

        let value = match wire_type {
            WIRE_VARINT => FieldValue::Varint(self.read_varint()?),
            WIRE_LEN => FieldValue::Bytes(self.read_bytes()?),
            other => {
                return Err(WireError::UnsupportedWireType {
                    field,
                    wire_type: other,
                })
            }
        };
        Ok(Some((field, value)))
    }
}
