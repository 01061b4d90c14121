//! Account addresses
//!
//! An address is the one-byte network prefix `0x41` followed by the last
//! 20 bytes of the Keccak-256 hash of the uncompressed public key. Nodes
//! speak hex (`41...`); people read Base58Check (`T...`).

use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::hash::{double_sha256, keccak256};
use super::keys::KeyError;

/// Mainnet address prefix byte
pub const ADDRESS_PREFIX: u8 = 0x41;

/// Prefix byte plus 20-byte account hash
pub const ADDRESS_LEN: usize = 21;

/// A 21-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Build an address from its raw 21 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(KeyError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            )));
        }
        if bytes[0] != ADDRESS_PREFIX {
            return Err(KeyError::InvalidAddress(format!(
                "unexpected prefix byte 0x{:02x}",
                bytes[0]
            )));
        }
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Derive the address controlled by a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        // Uncompressed key is 0x04 || x || y; the tag byte is not hashed
        let uncompressed = public_key.serialize_uncompressed();
        let hash = keccak256(&uncompressed[1..]);

        let mut out = [0u8; ADDRESS_LEN];
        out[0] = ADDRESS_PREFIX;
        out[1..].copy_from_slice(&hash[12..]);
        Self(out)
    }

    /// Parse a hex address, with or without `0x`, in any letter case
    pub fn from_hex(hex_addr: &str) -> Result<Self, KeyError> {
        let clean = hex_addr.trim().trim_start_matches("0x");
        let bytes =
            hex::decode(clean).map_err(|_| KeyError::InvalidAddress(hex_addr.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a Base58Check address
    pub fn from_base58(address: &str) -> Result<Self, KeyError> {
        let decoded = bs58::decode(address.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidAddress(address.to_string()))?;

        if decoded.len() != ADDRESS_LEN + 4 {
            return Err(KeyError::InvalidAddress(address.to_string()));
        }

        let (data, checksum) = decoded.split_at(ADDRESS_LEN);
        if &double_sha256(data)[..4] != checksum {
            return Err(KeyError::InvalidAddress(format!(
                "bad checksum in {}",
                address
            )));
        }

        Self::from_bytes(data)
    }

    /// Raw 21 bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex form used in node requests and responses
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Base58Check form (`T...`)
    pub fn to_base58(&self) -> String {
        let checksum = double_sha256(&self.0);
        let mut with_checksum = self.0.to_vec();
        with_checksum.extend_from_slice(&checksum[..4]);
        bs58::encode(with_checksum).into_string()
    }

    /// The 20-byte account hash left-padded to a 32-byte ABI word, as hex
    pub fn abi_word_hex(&self) -> String {
        format!("{:0>64}", hex::encode(&self.0[1..]))
    }
}

impl FromStr for Address {
    type Err = KeyError;

    /// Accepts Base58Check (`T...`) or hex (`41...` / `0x41...`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('T') {
            Self::from_base58(s)
        } else {
            Self::from_hex(s)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}
