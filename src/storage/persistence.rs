//! Pending transaction store
//!
//! One JSON file per account under `<data_dir>/pending/`, holding that
//! account's pending transactions in document form.

use crate::crypto::Address;
use crate::multisig::{PendingDocument, PendingTransaction};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(crate::config::DEFAULT_DATA_DIR),
        }
    }
}

/// Per-account collection of pending transactions
pub struct PendingStore {
    dir: PathBuf,
}

impl PendingStore {
    /// Open (creating if needed) the store under `config.data_dir`
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let dir = config.data_dir.join("pending");
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self, StorageError> {
        Self::new(StorageConfig::default())
    }

    fn account_path(&self, account: &Address) -> PathBuf {
        self.dir.join(format!("{}.json", account.to_base58()))
    }

    /// Insert a transaction, or replace the stored one with the same id
    pub fn upsert(&self, pending: &PendingTransaction) -> Result<(), StorageError> {
        let account = pending.from();
        let mut records = self.list(account)?;

        match records.iter_mut().find(|p| p.id() == pending.id()) {
            Some(existing) => *existing = pending.clone(),
            None => records.push(pending.clone()),
        }

        self.write(account, &records)?;
        log::debug!("Stored {} ({:?}) for {}", pending.id(), pending.status(), account);
        Ok(())
    }

    pub fn get(&self, account: &Address, id: &str) -> Result<Option<PendingTransaction>, StorageError> {
        Ok(self.list(account)?.into_iter().find(|p| p.id() == id))
    }

    /// Look up by local id or txId across every account
    pub fn find(&self, key: &str) -> Result<Option<PendingTransaction>, StorageError> {
        let key = key.to_lowercase();
        for account in self.accounts()? {
            if let Some(found) = self
                .list(&account)?
                .into_iter()
                .find(|p| p.id() == key || p.tx_id().to_hex() == key)
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// All transactions of an account, oldest first
    pub fn list(&self, account: &Address) -> Result<Vec<PendingTransaction>, StorageError> {
        let path = self.account_path(account);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&path)?;
        let documents: Vec<PendingDocument> = serde_json::from_reader(BufReader::new(file))?;

        let mut records = Vec::with_capacity(documents.len());
        for doc in documents {
            let id = doc.id.clone();
            match PendingTransaction::try_from(doc) {
                Ok(pending) => records.push(pending),
                Err(e) => log::warn!("Skipping stored transaction {}: {}", id, e),
            }
        }
        records.sort_by_key(|p| p.created_at());
        Ok(records)
    }

    /// Accounts with a store file
    pub fn accounts(&self) -> Result<Vec<Address>, StorageError> {
        let mut accounts = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            match Address::from_base58(stem) {
                Ok(address) => accounts.push(address),
                Err(_) => log::debug!("Ignoring {}", path.display()),
            }
        }
        accounts.sort_by_key(|a| a.to_base58());
        Ok(accounts)
    }

    /// Remove a transaction from local bookkeeping. Returns whether it
    /// was present.
    pub fn remove(&self, account: &Address, id: &str) -> Result<bool, StorageError> {
        let mut records = self.list(account)?;
        let before = records.len();
        records.retain(|p| p.id() != id);
        if records.len() == before {
            return Ok(false);
        }

        if records.is_empty() {
            fs::remove_file(self.account_path(account))?;
        } else {
            self.write(account, &records)?;
        }
        log::info!("Removed {} from {}", id, account);
        Ok(true)
    }

    fn write(&self, account: &Address, records: &[PendingTransaction]) -> Result<(), StorageError> {
        let path = self.account_path(account);
        let documents: Vec<PendingDocument> =
            records.iter().cloned().map(PendingDocument::from).collect();

        // Write to temporary file first
        let temp_path = path.with_extension("tmp");
        let file = fs::File::create(&temp_path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &documents)?;

        // Atomic rename
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ContractCall, ContractParameter, Permission, PermissionKey, RawTransactionData,
        Transaction, TransferContract,
    };
    use crate::multisig::{AssetType, PendingStatus};
    use crate::wallet::Wallet;
    use chrono::Utc;
    use tempfile::tempdir;

    fn pending_for(owner: Address, signer: &Wallet, amount: i64) -> PendingTransaction {
        let now = Utc::now().timestamp_millis();
        let to = Wallet::new().address();
        let tx = Transaction::new(RawTransactionData {
            ref_block_bytes: vec![0x0a, 0x0b],
            ref_block_num: 0,
            ref_block_hash: vec![0x42; 8],
            expiration: now + 300_000,
            data: vec![],
            contract: ContractCall::new(
                ContractParameter::Transfer(TransferContract {
                    owner_address: owner,
                    to_address: to,
                    amount,
                }),
                0,
            ),
            timestamp: now,
            fee_limit: 0,
        });
        let permission = Permission::owner(1, vec![PermissionKey::new(signer.address(), 1)]);
        PendingTransaction::new(tx, permission, Some(to), amount, Some(AssetType::Native)).unwrap()
    }

    fn store(dir: &Path) -> PendingStore {
        PendingStore::new(StorageConfig {
            data_dir: dir.to_path_buf(),
        })
        .unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let temp = tempdir().unwrap();
        let store = store(temp.path());
        let signer = Wallet::new();
        let owner = Wallet::new().address();

        let pending = pending_for(owner, &signer, 100);
        store.upsert(&pending).unwrap();
        assert_eq!(store.get(&owner, pending.id()).unwrap(), Some(pending.clone()));

        let signed = pending.sign(&signer).unwrap();
        store.upsert(&signed).unwrap();

        let listed = store.list(&owner).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status(), PendingStatus::Ready);
        assert!(store.dir().join(format!("{}.json", owner.to_base58())).exists());
    }

    #[test]
    fn test_find_by_id_or_tx_id() {
        let temp = tempdir().unwrap();
        let store = store(temp.path());
        let signer = Wallet::new();
        let first = pending_for(Wallet::new().address(), &signer, 1);
        let second = pending_for(Wallet::new().address(), &signer, 2);
        store.upsert(&first).unwrap();
        store.upsert(&second).unwrap();

        assert_eq!(store.accounts().unwrap().len(), 2);
        assert_eq!(store.find(second.id()).unwrap().map(|p| p.amount()), Some(2));
        assert_eq!(
            store
                .find(&first.tx_id().to_hex().to_uppercase())
                .unwrap()
                .map(|p| p.amount()),
            Some(1)
        );
        assert!(store.find("nope").unwrap().is_none());
    }

    #[test]
    fn test_remove() {
        let temp = tempdir().unwrap();
        let store = store(temp.path());
        let signer = Wallet::new();
        let owner = Wallet::new().address();
        let a = pending_for(owner, &signer, 1);
        let b = pending_for(owner, &signer, 2);
        store.upsert(&a).unwrap();
        store.upsert(&b).unwrap();

        assert!(store.remove(&owner, a.id()).unwrap());
        assert!(!store.remove(&owner, a.id()).unwrap());
        assert_eq!(store.list(&owner).unwrap(), vec![b.clone()]);

        assert!(store.remove(&owner, b.id()).unwrap());
        assert!(store.accounts().unwrap().is_empty());
    }

    #[test]
    fn test_tampered_record_skipped() {
        let temp = tempdir().unwrap();
        let store = store(temp.path());
        let signer = Wallet::new();
        let owner = Wallet::new().address();
        let pending = pending_for(owner, &signer, 7);
        store.upsert(&pending).unwrap();

        let path = store.dir().join(format!("{}.json", owner.to_base58()));
        let contents = fs::read_to_string(&path).unwrap();
        fs::write(&path, contents.replace("\"amount\": 7", "\"amount\": 8")).unwrap();

        assert!(store.list(&owner).unwrap().is_empty());
    }
}
