//! Building pending transactions from node envelopes
//!
//! The node hands out an unsigned envelope. It is verified against the
//! local encoding, checked against what was asked for, and its expiration is
//! pushed out so co-signers have time to sign.

use super::permission::{permits, validate_permission, MAX_ACTIVE_PERMISSIONS};
use super::transaction::{AssetType, PendingTransaction};
use super::MultisigError;
use crate::config::ClientConfig;
use crate::core::abi::{
    balance_of_parameter, decode_uint, transfer_call_data, transfer_parameter,
    BALANCE_OF_SIGNATURE, TRANSFER_SIGNATURE,
};
use crate::core::{
    AccountPermissionUpdateContract, ContractParameter, ContractType, Permission, PermissionKind,
    Transaction, TransactionJson, FIRST_ACTIVE_PERMISSION_ID,
};
use crate::crypto::Address;
use crate::network::{ChainNode, PermissionUpdateRequest, TransferRequest, TriggerRequest};

/// Builds pending transactions against a chain node
pub struct TransactionBuilder<'a, N: ChainNode + ?Sized> {
    node: &'a N,
    extension_secs: i64,
    token_fee_limit: i64,
}

impl<'a, N: ChainNode + ?Sized> TransactionBuilder<'a, N> {
    pub fn new(node: &'a N, config: &ClientConfig) -> Self {
        Self {
            node,
            extension_secs: config.expiration_extension_secs,
            token_fee_limit: config.token_fee_limit,
        }
    }

    /// Propose a transfer of `amount` out of `from`, authorized by the
    /// permission with id `permission_id` (0 for owner, 2+ for actives).
    pub async fn build_transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: i64,
        asset: &AssetType,
        permission_id: i32,
    ) -> Result<PendingTransaction, MultisigError> {
        if amount <= 0 {
            return Err(MultisigError::Validation(format!(
                "amount must be positive, got {}",
                amount
            )));
        }
        if from == to {
            return Err(MultisigError::Validation(
                "cannot transfer to the sending account".to_string(),
            ));
        }
        if let AssetType::Token { contract } = asset {
            if contract == from {
                return Err(MultisigError::Validation(
                    "token contract cannot be the sending account".to_string(),
                ));
            }
        }

        let contract_type = match asset {
            AssetType::Native => ContractType::Transfer,
            AssetType::Token { .. } => ContractType::TriggerSmartContract,
        };
        let permission = self
            .authorizing_permission(from, permission_id, contract_type)
            .await?;

        let envelope = match asset {
            AssetType::Native => {
                let request = TransferRequest {
                    owner_address: *from,
                    to_address: *to,
                    amount,
                    permission_id,
                };
                log::debug!("Requesting transfer envelope: {:?}", request);
                self.node.create_transaction(&request).await?
            }
            AssetType::Token { contract } => {
                let request = TriggerRequest {
                    owner_address: *from,
                    contract_address: *contract,
                    function_selector: TRANSFER_SIGNATURE.to_string(),
                    parameter: transfer_parameter(to, amount as u64),
                    fee_limit: self.token_fee_limit,
                    call_value: 0,
                    permission_id,
                };
                log::debug!("Requesting token transfer envelope: {:?}", request);
                self.node.trigger_smart_contract(&request).await?
            }
        };

        let transaction = verified(envelope)?;
        check_permission_id(&transaction, permission_id)?;

        let matches_request = match (&transaction.contract().parameter, asset) {
            (ContractParameter::Transfer(t), AssetType::Native) => {
                t.owner_address == *from && t.to_address == *to && t.amount == amount
            }
            (ContractParameter::TriggerSmartContract(t), AssetType::Token { contract }) => {
                t.owner_address == *from
                    && t.contract_address == *contract
                    && t.call_value == 0
                    && t.data == transfer_call_data(to, amount as u64)
            }
            _ => false,
        };
        if !matches_request {
            return Err(MultisigError::Validation(format!(
                "node envelope {} does not match the requested transfer",
                transaction.tx_id()
            )));
        }

        let pending = PendingTransaction::new(
            transaction.extend_expiration(self.extension_secs)?,
            permission,
            Some(*to),
            amount,
            Some(asset.clone()),
        )?;
        log::info!(
            "Proposed transfer {} of {} from {} to {} (expires {})",
            pending.tx_id(),
            amount,
            from,
            to,
            pending.expires_at()
        );
        Ok(pending)
    }

    /// Propose replacing the permission structure of `account`. Always
    /// authorized by the account's current owner permission.
    pub async fn build_permission_update(
        &self,
        account: &Address,
        owner: Permission,
        actives: Vec<Permission>,
        witness: Option<Permission>,
    ) -> Result<PendingTransaction, MultisigError> {
        if owner.kind != PermissionKind::Owner {
            return Err(MultisigError::Validation(
                "owner permission must be of kind Owner".to_string(),
            ));
        }
        validate_permission(&owner)?;

        if let Some(witness) = &witness {
            if witness.kind != PermissionKind::Witness {
                return Err(MultisigError::Validation(
                    "witness permission must be of kind Witness".to_string(),
                ));
            }
            validate_permission(witness)?;
        }

        if actives.is_empty() {
            return Err(MultisigError::Validation(
                "at least one active permission is required".to_string(),
            ));
        }
        if actives.len() > MAX_ACTIVE_PERMISSIONS {
            return Err(MultisigError::Validation(format!(
                "at most {} active permissions are allowed, got {}",
                MAX_ACTIVE_PERMISSIONS,
                actives.len()
            )));
        }
        let mut ids = Vec::with_capacity(actives.len());
        for active in &actives {
            if active.kind != PermissionKind::Active {
                return Err(MultisigError::Validation(format!(
                    "permission '{}' must be of kind Active",
                    active.name
                )));
            }
            if active.id < FIRST_ACTIVE_PERMISSION_ID || ids.contains(&active.id) {
                return Err(MultisigError::Validation(format!(
                    "active permission '{}' has invalid or duplicate id {}",
                    active.name, active.id
                )));
            }
            ids.push(active.id);
            validate_permission(active)?;
        }

        let current = self.node.get_account(account).await?;
        let permission = current.owner_permission;

        let request = PermissionUpdateRequest {
            owner_address: *account,
            owner,
            witness,
            actives,
        };
        let envelope = self.node.account_permission_update(&request).await?;
        let transaction = verified(envelope)?;
        check_permission_id(&transaction, permission.id)?;

        let expected = ContractParameter::AccountPermissionUpdate(AccountPermissionUpdateContract {
            owner_address: request.owner_address,
            owner: request.owner,
            witness: request.witness,
            actives: request.actives,
        });
        if transaction.contract().parameter != expected {
            return Err(MultisigError::Validation(format!(
                "node envelope {} does not match the requested permission update",
                transaction.tx_id()
            )));
        }

        let pending = PendingTransaction::new(
            transaction.extend_expiration(self.extension_secs)?,
            permission,
            None,
            0,
            None,
        )?;
        log::info!(
            "Proposed permission update {} for {} (expires {})",
            pending.tx_id(),
            account,
            pending.expires_at()
        );
        Ok(pending)
    }

    async fn authorizing_permission(
        &self,
        account: &Address,
        permission_id: i32,
        contract_type: ContractType,
    ) -> Result<Permission, MultisigError> {
        let info = self.node.get_account(account).await?;
        let permission = info.permission(permission_id).cloned().ok_or_else(|| {
            MultisigError::Validation(format!(
                "account {} has no permission with id {}",
                account, permission_id
            ))
        })?;
        validate_permission(&permission)?;

        if permission.kind == PermissionKind::Witness {
            return Err(MultisigError::Validation(
                "witness permission cannot authorize transfers".to_string(),
            ));
        }
        if !permits(&permission, contract_type) {
            return Err(MultisigError::Validation(format!(
                "permission '{}' does not allow {}",
                permission.name,
                contract_type.name()
            )));
        }
        Ok(permission)
    }
}

/// Balance of `holder` in the TRC-20 token at `token`
pub async fn token_balance<N: ChainNode + ?Sized>(
    node: &N,
    token: &Address,
    holder: &Address,
) -> Result<u128, MultisigError> {
    let request = TriggerRequest {
        owner_address: *holder,
        contract_address: *token,
        function_selector: BALANCE_OF_SIGNATURE.to_string(),
        parameter: balance_of_parameter(holder),
        fee_limit: 0,
        call_value: 0,
        permission_id: 0,
    };
    let words = node.trigger_constant_contract(&request).await?;
    words
        .first()
        .and_then(|word| decode_uint(word))
        .ok_or_else(|| MultisigError::Validation("unexpected balanceOf result".to_string()))
}

fn verified(envelope: TransactionJson) -> Result<Transaction, MultisigError> {
    let transaction = Transaction::try_from(envelope)?;
    log::debug!("Verified node envelope {}", transaction.tx_id());
    Ok(transaction)
}

fn check_permission_id(transaction: &Transaction, expected: i32) -> Result<(), MultisigError> {
    let actual = transaction.contract().permission_id;
    if actual != expected {
        return Err(MultisigError::Validation(format!(
            "node envelope uses permission {} instead of {}",
            actual, expected
        )));
    }
    Ok(())
}
