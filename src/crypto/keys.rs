//! ECDSA key management
//!
//! Key pair generation, recoverable signing and public key recovery using
//! the secp256k1 elliptic curve.

use rand::rngs::OsRng;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::address::Address;

/// Serialized signature length: r(32) || s(32) || recovery(1)
pub const SIGNATURE_LEN: usize = 65;

/// Errors that can occur during key operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Digest must be 32 bytes, got {0}")]
    InvalidDigest(usize),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Signature recovery failed: {0}")]
    SignatureRecoveryFailed(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A recoverable ECDSA signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Raw recovery id (0 or 1), not the 27/28 offset form
    pub recovery_id: u8,
}

impl Signature {
    /// Serialize as `r || s || recovery_id`
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id;
        out
    }

    /// Parse a 65-byte signature. A trailing 27..=30 byte is normalized to
    /// the raw recovery id so signatures from offset-style signers recover too.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(KeyError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }

        let recovery_id = match bytes[64] {
            v @ 0..=3 => v,
            v @ 27..=30 => v - 27,
            v => {
                return Err(KeyError::InvalidSignature(format!(
                    "bad recovery byte 0x{:02x}",
                    v
                )))
            }
        };

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, recovery_id })
    }
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key (with or without `0x`)
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim().trim_start_matches("0x"))
            .map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (uncompressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize_uncompressed())
    }

    /// Account address controlled by this key
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    /// Sign a 32-byte digest
    pub fn sign(&self, digest: &[u8]) -> Result<Signature, KeyError> {
        sign_digest(&self.secret_key, digest)
    }
}

/// Sign a 32-byte digest with a secret key.
///
/// Nonces are RFC6979-deterministic, so the same key and digest always
/// produce the same signature bytes.
pub fn sign_digest(secret_key: &SecretKey, digest: &[u8]) -> Result<Signature, KeyError> {
    let message = digest_message(digest)?;
    let secp = Secp256k1::new();
    let signature = secp.sign_ecdsa_recoverable(&message, secret_key);
    let (recovery_id, compact) = signature.serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&compact[..32]);
    s.copy_from_slice(&compact[32..]);

    Ok(Signature {
        r,
        s,
        recovery_id: recovery_id.to_i32() as u8,
    })
}

/// Recover the public key that produced `signature` over `digest`
pub fn recover_public_key(digest: &[u8], signature: &[u8]) -> Result<PublicKey, KeyError> {
    let message = digest_message(digest)?;
    let parsed = Signature::from_bytes(signature)?;

    let recovery_id = RecoveryId::from_i32(i32::from(parsed.recovery_id))
        .map_err(|e| KeyError::SignatureRecoveryFailed(e.to_string()))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|e| KeyError::SignatureRecoveryFailed(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    secp.recover_ecdsa(&message, &recoverable)
        .map_err(|e| KeyError::SignatureRecoveryFailed(e.to_string()))
}

/// Recover the signer's address from a signature over `digest`
pub fn recover_address(digest: &[u8], signature: &[u8]) -> Result<Address, KeyError> {
    recover_public_key(digest, signature).map(|pk| Address::from_public_key(&pk))
}

fn digest_message(digest: &[u8]) -> Result<Message, KeyError> {
    if digest.len() != 32 {
        return Err(KeyError::InvalidDigest(digest.len()));
    }
    Ok(Message::from_digest_slice(digest)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256;

    #[test]
    fn test_key_pair_generation() {
        let kp = KeyPair::generate();
        assert_eq!(kp.private_key_hex().len(), 64);
        assert_eq!(kp.public_key_hex().len(), 130);
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let private_hex = kp1.private_key_hex();

        let kp2 = KeyPair::from_private_key_hex(&private_hex).unwrap();
        assert_eq!(kp1.public_key_hex(), kp2.public_key_hex());
        assert_eq!(kp1.address(), kp2.address());

        let kp3 = KeyPair::from_private_key_hex(&format!("0x{}", private_hex)).unwrap();
        assert_eq!(kp1.address(), kp3.address());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(KeyPair::from_private_key_hex("zz").is_err());
        assert!(KeyPair::from_private_key_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_sign_and_recover() {
        let kp = KeyPair::generate();
        let digest = sha256(b"Hello, multisig!");

        let signature = kp.sign(&digest).unwrap();
        assert!(signature.recovery_id <= 1);

        let recovered = recover_address(&digest, &signature.to_bytes()).unwrap();
        assert_eq!(recovered, kp.address());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let kp = KeyPair::generate();
        let digest = sha256(b"same digest");

        let first = kp.sign(&digest).unwrap();
        let second = kp.sign(&digest).unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_offset_recovery_byte_accepted() {
        let kp = KeyPair::generate();
        let digest = sha256(b"offset form");

        let mut bytes = kp.sign(&digest).unwrap().to_bytes();
        bytes[64] += 27;
        assert_eq!(recover_address(&digest, &bytes).unwrap(), kp.address());
    }

    #[test]
    fn test_malformed_signature() {
        let digest = sha256(b"payload");
        assert!(matches!(
            recover_address(&digest, &[0u8; 10]),
            Err(KeyError::InvalidSignature(_))
        ));

        let mut bad = [0u8; SIGNATURE_LEN];
        bad[64] = 99;
        assert!(recover_address(&digest, &bad).is_err());

        // All-zero r/s is not a valid curve signature
        assert!(recover_address(&digest, &[0u8; SIGNATURE_LEN]).is_err());
    }

    #[test]
    fn test_digest_length_enforced() {
        let kp = KeyPair::generate();
        assert!(matches!(kp.sign(b"short"), Err(KeyError::InvalidDigest(5))));
    }

    #[test]
    fn test_signature_bytes_roundtrip() {
        let kp = KeyPair::generate();
        let signature = kp.sign(&sha256(b"bytes")).unwrap();
        let parsed = Signature::from_bytes(&signature.to_bytes()).unwrap();
        assert_eq!(parsed, signature);
    }
}
