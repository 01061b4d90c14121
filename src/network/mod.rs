//! Chain node networking
//!
//! Provides access to a TRON-compatible full node.
//!
//! # Features
//! - `ChainNode` port used by the multisig engine
//! - HTTP JSON client for the `/wallet/*` API
//! - Decoding of node rejections (hex messages, reason classification)

pub mod client;
pub mod message;
#[cfg(test)]
pub(crate) mod mock;
pub mod node;

pub use client::HttpNode;
pub use message::{decode_hex_message, NodeError, RejectionReason};
pub use node::{
    AccountInfo, ChainNode, PermissionUpdateRequest, TransactionInfo, TransferRequest,
    TriggerRequest,
};
