//! Core protocol model
//!
//! This module contains the chain-facing building blocks:
//! - Raw transaction data and its contract payloads
//! - Account permissions
//! - TRC-20 call encoding
//! - Canonical wire encoding
//! - Transaction identity (txId / signing digest)
//! - The signed transaction envelope

pub mod abi;
pub mod contract;
pub mod encoding;
pub mod identity;
pub mod permission;
pub mod raw;
pub mod transaction;
pub mod wire;

pub use contract::{
    AccountPermissionUpdateContract, ContractCall, ContractParameter, ContractType,
    TransferContract, TriggerSmartContract, TYPE_URL_PREFIX,
};
pub use identity::{transaction_id, verify_envelope, TxId};
pub use permission::{
    operations_allow, operations_bitmap, Permission, PermissionKey, PermissionKind,
    FIRST_ACTIVE_PERMISSION_ID, OPERATIONS_LEN, OWNER_PERMISSION_ID, WITNESS_PERMISSION_ID,
};
pub use raw::{RawDataJson, RawTransactionData};
pub use transaction::{Transaction, TransactionJson, MAX_EXPIRATION_WINDOW_MS};
pub use wire::{decode, encode, WireError};
