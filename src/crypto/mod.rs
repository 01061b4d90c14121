//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 and Keccak-256 hashing
//! - ECDSA key management with recoverable signatures (secp256k1)
//! - Account address derivation and encoding

pub mod address;
pub mod hash;
pub mod keys;

pub use address::{Address, ADDRESS_LEN, ADDRESS_PREFIX};
pub use hash::{double_sha256, function_selector, keccak256, sha256};
pub use keys::{
    recover_address, recover_public_key, sign_digest, KeyError, KeyPair, Signature, SIGNATURE_LEN,
};
