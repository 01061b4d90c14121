//! CLI commands for the multisig client
//!
//! Implements all command handlers for the CLI interface.

use crate::config::ClientConfig;
use crate::core::{ContractParameter, Permission};
use crate::crypto::Address;
use crate::multisig::{
    export_document, import_document, token_balance, AssetType, MultisigError, PendingStatus,
    PendingTransaction, TransactionBuilder,
};
use crate::network::{ChainNode, HttpNode};
use crate::storage::{PendingStore, StorageConfig};
use crate::wallet::Wallet;
use chrono::Utc;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub config: ClientConfig,
    pub store: PendingStore,
}

impl AppState {
    /// Initialize application state
    pub fn new(config: ClientConfig) -> CliResult<Self> {
        let store = PendingStore::new(StorageConfig {
            data_dir: config.data_dir.clone(),
        })?;
        Ok(Self { config, store })
    }

    pub fn node(&self) -> CliResult<HttpNode> {
        Ok(HttpNode::new(&self.config)?)
    }

    fn wallets_dir(&self) -> PathBuf {
        self.config.data_dir.join("wallets")
    }

    /// Look up a stored transaction by local id or txId
    fn pending(&self, key: &str) -> CliResult<PendingTransaction> {
        self.store
            .find(key)?
            .ok_or_else(|| format!("No pending transaction matches '{}'", key).into())
    }
}

/// Permission layout read by `propose permission-update`
#[derive(Debug, Deserialize)]
pub struct PermissionUpdateFile {
    pub owner: Permission,
    pub actives: Vec<Permission>,
    #[serde(default)]
    pub witness: Option<Permission>,
}

/// Generate a new key pair and save it
pub fn cmd_key_generate(
    state: &AppState,
    label: Option<&str>,
    output: Option<&Path>,
    json: bool,
) -> CliResult<()> {
    let wallet = match label {
        Some(l) => Wallet::with_label(l),
        None => Wallet::new(),
    };

    let path = match output {
        Some(p) => p.to_path_buf(),
        None => {
            fs::create_dir_all(state.wallets_dir())?;
            state
                .wallets_dir()
                .join(format!("{}.json", wallet.address().to_base58()))
        }
    };
    wallet.save(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&wallet.export_public_info())?);
        return Ok(());
    }

    println!("🔐 New key generated!");
    println!("   📍 Address: {}", wallet.address());
    println!("   🔢 Hex: {}", wallet.address().to_hex());
    println!("   🔑 Public Key: {}...", &wallet.public_key()[..32]);
    if let Some(l) = &wallet.label {
        println!("   🏷️  Label: {}", l);
    }
    println!("   📁 Key file: {}", path.display());
    println!("\n   ⚠️  IMPORTANT: The private key is stored unencrypted in the key file.");

    Ok(())
}

/// Show the address of a key file
pub fn cmd_key_address(key_file: &Path) -> CliResult<()> {
    let wallet = Wallet::load(key_file)?;
    println!("📍 {}", wallet.address());
    println!("   Hex: {}", wallet.address().to_hex());
    Ok(())
}

pub fn cmd_address_to_hex(address: &str) -> CliResult<()> {
    let address: Address = address.parse()?;
    println!("{}", address.to_hex());
    Ok(())
}

pub fn cmd_address_to_base58(address: &str) -> CliResult<()> {
    let address: Address = address.parse()?;
    println!("{}", address.to_base58());
    Ok(())
}

/// Show balance and permissions of an account
pub async fn cmd_account(state: &AppState, address: &str) -> CliResult<()> {
    let address: Address = address.parse()?;
    let account = state.node()?.get_account(&address).await?;

    println!("👤 Account {}", account.address);
    println!("   💰 Balance: {} sun", account.balance);
    let permissions = std::iter::once(&account.owner_permission)
        .chain(account.witness_permission.iter())
        .chain(account.active_permissions.iter());
    for permission in permissions {
        println!(
            "   🔐 #{} {}: {}",
            permission.id,
            permission.name,
            permission.description()
        );
    }
    Ok(())
}

/// Show a TRC-20 token balance
pub async fn cmd_token_balance(state: &AppState, token: &str, holder: &str) -> CliResult<()> {
    let token: Address = token.parse()?;
    let holder: Address = holder.parse()?;
    let balance = token_balance(&state.node()?, &token, &holder).await?;
    println!("💰 {} holds {} of token {}", holder, balance, token);
    Ok(())
}

/// Propose a native or token transfer
pub async fn cmd_propose_transfer(
    state: &AppState,
    from: &str,
    to: &str,
    amount: i64,
    token: Option<&str>,
    permission_id: i32,
    description: Option<String>,
) -> CliResult<()> {
    let from: Address = from.parse()?;
    let to: Address = to.parse()?;
    let asset = match token {
        Some(t) => AssetType::Token {
            contract: t.parse()?,
        },
        None => AssetType::Native,
    };

    let node = state.node()?;
    let pending = TransactionBuilder::new(&node, &state.config)
        .build_transfer(&from, &to, amount, &asset, permission_id)
        .await?
        .with_description(description);
    state.store.upsert(&pending)?;

    println!("📝 Transfer proposed");
    print_summary(&pending);
    Ok(())
}

/// Propose a permission update from a JSON layout file
pub async fn cmd_propose_permission_update(
    state: &AppState,
    account: &str,
    layout: &Path,
    description: Option<String>,
) -> CliResult<()> {
    let account: Address = account.parse()?;
    let layout: PermissionUpdateFile = serde_json::from_str(&fs::read_to_string(layout)?)?;

    let node = state.node()?;
    let pending = TransactionBuilder::new(&node, &state.config)
        .build_permission_update(&account, layout.owner, layout.actives, layout.witness)
        .await?
        .with_description(description);
    state.store.upsert(&pending)?;

    println!("📝 Permission update proposed");
    print_summary(&pending);
    Ok(())
}

/// Sign a stored transaction with a key file
pub fn cmd_sign(state: &AppState, key: &str, key_file: &Path) -> CliResult<()> {
    let wallet = Wallet::load(key_file)?;
    let pending = state.pending(key)?;

    let signed = match pending.sign(&wallet) {
        Err(e @ MultisigError::ExpiredTransaction { .. }) => {
            state.store.upsert(&pending.expire_if_due(Utc::now()))?;
            println!("❌ {}", e);
            println!("   Re-issue it with: tron-multisig extend {}", pending.id());
            return Err(e.into());
        }
        other => other?,
    };
    state.store.upsert(&signed)?;

    println!("✍️  Signed by {}", wallet.address());
    println!(
        "   Weight: {}/{} ({:?})",
        signed.weight(),
        signed.threshold(),
        signed.status()
    );
    Ok(())
}

/// Show a stored transaction in detail
pub fn cmd_show(state: &AppState, key: &str) -> CliResult<()> {
    let pending = state.pending(key)?.expire_if_due(Utc::now());
    print_summary(&pending);

    match &pending.transaction().contract().parameter {
        ContractParameter::AccountPermissionUpdate(update) => {
            println!("   Proposed layout:");
            println!("   ├─ {}", update.owner.description());
            if let Some(witness) = &update.witness {
                println!("   ├─ {}", witness.description());
            }
            for active in &update.actives {
                println!("   ├─ {}", active.description());
            }
        }
        ContractParameter::TriggerSmartContract(call) => {
            println!("   Contract: {}", call.contract_address);
        }
        ContractParameter::Transfer(_) => {}
    }

    println!("   Keys of {}:", pending.permission().name);
    for key in &pending.permission().keys {
        let mark = if pending.signers().contains(&key.address) {
            "✅"
        } else {
            "⏳"
        };
        println!("   {} {} (weight {})", mark, key.address, key.weight);
    }
    if let Some(error) = pending.error_message() {
        println!("   ❌ Error: {}", error);
    }
    Ok(())
}

/// List stored transactions
pub fn cmd_list(state: &AppState, account: Option<&str>) -> CliResult<()> {
    let accounts = match account {
        Some(a) => vec![a.parse::<Address>()?],
        None => state.store.accounts()?,
    };

    let now = Utc::now();
    let mut count = 0;
    for account in &accounts {
        for pending in state.store.list(account)? {
            let pending = pending.expire_if_due(now);
            println!(
                "   {} | {:<9} | {}/{} | {} | {}",
                pending.id(),
                format!("{:?}", pending.status()),
                pending.weight(),
                pending.threshold(),
                pending.from(),
                pending.description().unwrap_or("-")
            );
            count += 1;
        }
    }

    if count == 0 {
        println!(
            "📭 No pending transactions in {}",
            state.config.pending_dir().display()
        );
    }
    Ok(())
}

/// Broadcast a transaction that has met its threshold
pub async fn cmd_broadcast(state: &AppState, key: &str) -> CliResult<()> {
    let pending = state.pending(key)?;
    let node = state.node()?;

    match pending.broadcast(&node).await {
        Ok(sent) => {
            state.store.upsert(&sent)?;
            println!("📡 Broadcast accepted");
            if let Some(tx_id) = sent.broadcast_tx_id() {
                println!("   txID: {}", tx_id);
            }
            Ok(())
        }
        Err(MultisigError::BroadcastFailed {
            transaction,
            source,
        }) => {
            state.store.upsert(&transaction)?;
            println!("❌ Broadcast rejected: {}", source);
            Err(source.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Check whether a broadcast transaction is confirmed
pub async fn cmd_confirm(state: &AppState, key: &str) -> CliResult<()> {
    let pending = state.pending(key)?;
    let checked = pending.check_confirmation(&state.node()?).await?;
    state.store.upsert(&checked)?;

    match checked.status() {
        PendingStatus::Confirmed => println!("✅ Confirmed"),
        PendingStatus::Failed => println!(
            "❌ Failed: {}",
            checked.error_message().unwrap_or("unknown error")
        ),
        _ => println!("⏳ Not yet in a block"),
    }
    Ok(())
}

/// Re-issue a transaction with a later expiration
pub fn cmd_extend(state: &AppState, key: &str, seconds: Option<i64>) -> CliResult<()> {
    let pending = state.pending(key)?;
    let reissued = pending.reissue(seconds.unwrap_or(state.config.expiration_extension_secs))?;
    state.store.upsert(&reissued.pending)?;

    println!("🔁 Re-issued as {}", reissued.pending.tx_id());
    println!("   Expires: {}", reissued.pending.expires_at());
    if !reissued.invalidated_signers.is_empty() {
        println!("   ⚠️  These signers must sign again:");
        for signer in &reissued.invalidated_signers {
            println!("   └─ {}", signer);
        }
    }
    Ok(())
}

/// Export a transaction document for co-signers
pub fn cmd_export(state: &AppState, key: &str, output: Option<&Path>) -> CliResult<()> {
    let json = export_document(&state.pending(key)?)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            println!("📤 Exported to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Import a document, merging with any copy already stored
pub fn cmd_import(state: &AppState, input: &Path) -> CliResult<()> {
    let imported = import_document(&fs::read_to_string(input)?)?;

    let merged = match state.store.get(imported.from(), imported.id())? {
        Some(existing) if existing.tx_id() == imported.tx_id() => existing.merge(&imported)?,
        _ => imported,
    };
    state.store.upsert(&merged)?;

    println!("📥 Imported {}", merged.id());
    println!(
        "   Weight: {}/{} ({:?})",
        merged.weight(),
        merged.threshold(),
        merged.status()
    );
    Ok(())
}

/// Remove a transaction from local bookkeeping
pub fn cmd_delete(state: &AppState, key: &str) -> CliResult<()> {
    let pending = state.pending(key)?;
    if !pending.status().is_terminal() {
        println!("⚠️  {} is still {:?}; co-signers keep their copies", pending.id(), pending.status());
    }
    state.store.remove(pending.from(), pending.id())?;
    println!("🗑️  Deleted {}", pending.id());
    Ok(())
}

fn print_summary(pending: &PendingTransaction) {
    println!("   ├─ Id: {}", pending.id());
    println!("   ├─ txID: {}", pending.tx_id());
    println!("   ├─ Type: {}", pending.contract_type().name());
    println!("   ├─ From: {}", pending.from());
    if let Some(to) = pending.to() {
        let unit = match pending.asset_type() {
            Some(AssetType::Token { contract }) => format!("of token {}", contract),
            _ => "sun".to_string(),
        };
        println!("   ├─ To: {}", to);
        println!("   ├─ Amount: {} {}", pending.amount(), unit);
    }
    if let Some(description) = pending.description() {
        println!("   ├─ Description: {}", description);
    }
    println!(
        "   ├─ Weight: {}/{} ({})",
        pending.weight(),
        pending.threshold(),
        pending.permission().name
    );
    println!("   ├─ Expires: {}", pending.expires_at());
    println!("   └─ Status: {:?}", pending.status());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_permission_update_file() {
        let owner = Wallet::new().address();
        let json = serde_json::json!({
            "owner": {
                "type": "Owner",
                "permission_name": "owner",
                "threshold": 2,
                "keys": [
                    {"address": owner.to_base58(), "weight": 1},
                    {"address": Wallet::new().address().to_hex(), "weight": 1}
                ]
            },
            "actives": [{
                "type": "Active",
                "id": 2,
                "permission_name": "payments",
                "threshold": 1,
                "operations": "0200000000000000000000000000000000000000000000000000000000000000",
                "keys": [{"address": owner.to_base58(), "weight": 1}]
            }]
        });

        let layout: PermissionUpdateFile = serde_json::from_value(json).unwrap();
        assert_eq!(layout.owner.threshold, 2);
        assert_eq!(layout.owner.keys[0].address, owner);
        assert_eq!(layout.actives[0].id, 2);
        assert!(layout.witness.is_none());
    }

    #[test]
    fn test_sign_after_expiry_fails() {
        use crate::core::{ContractCall, RawTransactionData, TransferContract};
        use crate::core::{PermissionKey, Transaction};

        let temp = tempdir().unwrap();
        let state = AppState::new(ClientConfig::default().with_data_dir(temp.path())).unwrap();
        let signer = Wallet::new();
        let key_file = temp.path().join("signer.json");
        signer.save(&key_file).unwrap();

        let now = Utc::now().timestamp_millis();
        let to = Wallet::new().address();
        let tx = Transaction::new(RawTransactionData {
            ref_block_bytes: vec![0x01, 0x02],
            ref_block_num: 0,
            ref_block_hash: vec![0xee; 8],
            expiration: now - 1_000,
            data: vec![],
            contract: ContractCall::new(
                ContractParameter::Transfer(TransferContract {
                    owner_address: Wallet::new().address(),
                    to_address: to,
                    amount: 10,
                }),
                0,
            ),
            timestamp: now - 60_000,
            fee_limit: 0,
        });
        let permission = Permission::owner(1, vec![PermissionKey::new(signer.address(), 1)]);
        let pending =
            PendingTransaction::new(tx, permission, Some(to), 10, Some(AssetType::Native)).unwrap();
        state.store.upsert(&pending).unwrap();

        assert!(cmd_sign(&state, pending.id(), &key_file).is_err());
        let stored = state.pending(pending.id()).unwrap();
        assert_eq!(stored.status(), PendingStatus::Expired);
        assert!(stored.transaction().signatures().is_empty());
    }

    #[test]
    fn test_missing_pending_reported() {
        let temp = tempdir().unwrap();
        let state = AppState::new(ClientConfig::default().with_data_dir(temp.path())).unwrap();
        assert!(cmd_show(&state, "unknown").is_err());
        assert!(cmd_list(&state, None).is_ok());
    }
}
