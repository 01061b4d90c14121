//! Signature registry
//!
//! Signatures are kept as the exact bytes submitted. Signer identity is
//! never stored on its own authority: it is recovered from the signature
//! and the transaction id whenever it is needed.

use super::MultisigError;
use crate::core::{Transaction, TxId};
use crate::crypto::{recover_address, Address};

/// Append a signature unless the exact same bytes are already present.
/// Adding the same signature twice leaves the transaction unchanged.
pub fn add_signature(tx: &Transaction, signature: &[u8]) -> Transaction {
    if tx.signatures().iter().any(|s| s.as_slice() == signature) {
        return tx.clone();
    }
    let mut signatures = tx.signatures().to_vec();
    signatures.push(signature.to_vec());
    tx.with_signatures(signatures)
}

/// Recover the address that produced `signature` over `tx_id`
pub fn recover_signer(tx_id: &TxId, signature: &[u8]) -> Result<Address, MultisigError> {
    recover_address(tx_id.as_bytes(), signature)
        .map_err(|e| MultisigError::SignatureRecovery(e.to_string()))
}

/// Recovered signers in signature order, without duplicates. Signatures
/// that fail to recover are logged and left out.
pub fn effective_signers(tx: &Transaction) -> Vec<Address> {
    let mut signers: Vec<Address> = Vec::new();
    for (index, signature) in tx.signatures().iter().enumerate() {
        match recover_signer(tx.tx_id(), signature) {
            Ok(address) => {
                if !signers.contains(&address) {
                    signers.push(address);
                }
            }
            Err(e) => log::warn!(
                "Dropping signature #{} on {}: {}",
                index,
                tx.tx_id(),
                e
            ),
        }
    }
    signers
}

/// Union of the signatures of two copies of the same transaction
pub fn merge_signatures(a: &Transaction, b: &Transaction) -> Result<Transaction, MultisigError> {
    if a.tx_id() != b.tx_id() {
        return Err(MultisigError::Validation(format!(
            "cannot merge signatures of {} into {}",
            b.tx_id(),
            a.tx_id()
        )));
    }
    Ok(b
        .signatures()
        .iter()
        .fold(a.clone(), |tx, signature| add_signature(&tx, signature)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ContractCall, ContractParameter, RawTransactionData, TransferContract};
    use crate::wallet::Wallet;

    fn unsigned(amount: i64) -> Transaction {
        Transaction::new(RawTransactionData {
            ref_block_bytes: vec![0x01, 0x02],
            ref_block_num: 0,
            ref_block_hash: vec![0xcc; 8],
            expiration: 2_000_000,
            data: vec![],
            contract: ContractCall::new(
                ContractParameter::Transfer(TransferContract {
                    owner_address: Wallet::new().address(),
                    to_address: Wallet::new().address(),
                    amount,
                }),
                0,
            ),
            timestamp: 1_000_000,
            fee_limit: 0,
        })
    }

    #[test]
    fn test_add_is_idempotent() {
        let tx = unsigned(5);
        let sig = Wallet::new().sign(tx.tx_id()).unwrap();

        let once = add_signature(&tx, &sig);
        let twice = add_signature(&once, &sig);
        assert_eq!(once.signatures().len(), 1);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_recover_signer() {
        let tx = unsigned(5);
        let wallet = Wallet::new();
        let sig = wallet.sign(tx.tx_id()).unwrap();
        assert_eq!(recover_signer(tx.tx_id(), &sig).unwrap(), wallet.address());

        // Offset-style recovery byte recovers the same address
        let mut offset = sig.clone();
        offset[64] += 27;
        assert_eq!(recover_signer(tx.tx_id(), &offset).unwrap(), wallet.address());
    }

    #[test]
    fn test_bad_signature_dropped_from_effective_set() {
        let tx = unsigned(5);
        let wallet = Wallet::new();
        let good = wallet.sign(tx.tx_id()).unwrap();

        let tx = add_signature(&tx, &[0u8; 10]);
        let tx = add_signature(&tx, &good);
        assert!(matches!(
            recover_signer(tx.tx_id(), &[0u8; 10]),
            Err(MultisigError::SignatureRecovery(_))
        ));
        assert_eq!(effective_signers(&tx), vec![wallet.address()]);
    }

    #[test]
    fn test_effective_signers_ordered_unique() {
        let tx = unsigned(5);
        let a = Wallet::new();
        let b = Wallet::new();

        let sig_a = a.sign(tx.tx_id()).unwrap();
        let mut sig_a_offset = sig_a.clone();
        sig_a_offset[64] += 27;

        let sig_b = b.sign(tx.tx_id()).unwrap();

        let tx = add_signature(&tx, &sig_b);
        let tx = add_signature(&tx, &sig_a);
        let tx = add_signature(&tx, &sig_a_offset);

        assert_eq!(tx.signatures().len(), 3);
        assert_eq!(effective_signers(&tx), vec![b.address(), a.address()]);
    }

    #[test]
    fn test_signature_for_other_tx_recovers_other_address() {
        let tx = unsigned(5);
        let other = unsigned(6);
        let wallet = Wallet::new();
        let sig = wallet.sign(other.tx_id()).unwrap();

        // Recovers to some address, just not the wallet's
        let tx = add_signature(&tx, &sig);
        assert!(!effective_signers(&tx).contains(&wallet.address()));
    }

    #[test]
    fn test_merge() {
        let tx = unsigned(5);
        let a = Wallet::new();
        let b = Wallet::new();
        let sig_a = a.sign(tx.tx_id()).unwrap();
        let sig_b = b.sign(tx.tx_id()).unwrap();

        let left = add_signature(&tx, &sig_a);
        let right = add_signature(&add_signature(&tx, &sig_b), &sig_a);
        let merged = merge_signatures(&left, &right).unwrap();
        assert_eq!(merged.signatures(), &[sig_a, sig_b][..]);

        assert!(merge_signatures(&tx, &unsigned(6)).is_err());
    }
}
