//! In-memory chain node for unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::message::NodeError;
use super::node::{
    AccountInfo, ChainNode, PermissionUpdateRequest, TransactionInfo, TransferRequest,
    TriggerRequest,
};
use crate::core::{
    AccountPermissionUpdateContract, ContractCall, ContractParameter, RawTransactionData,
    Transaction, TransactionJson, TransferContract, TriggerSmartContract, TxId,
};
use crate::crypto::{function_selector, Address};

/// Node lifetime given to fresh envelopes
pub const NODE_EXPIRATION_MS: i64 = 60_000;

pub struct MockNode {
    pub now_ms: i64,
    pub accounts: Mutex<HashMap<Address, AccountInfo>>,
    pub token_balances: Mutex<HashMap<Address, u64>>,
    /// Error returned by the next broadcasts; success when `None`
    pub broadcast_error: Mutex<Option<NodeError>>,
    pub broadcasts: Mutex<Vec<Transaction>>,
    pub infos: Mutex<HashMap<TxId, TransactionInfo>>,
    /// Amount the node silently puts into transfer envelopes instead of
    /// the requested one
    pub tamper_amount: Mutex<Option<i64>>,
}

impl MockNode {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms,
            accounts: Mutex::new(HashMap::new()),
            token_balances: Mutex::new(HashMap::new()),
            broadcast_error: Mutex::new(None),
            broadcasts: Mutex::new(Vec::new()),
            infos: Mutex::new(HashMap::new()),
            tamper_amount: Mutex::new(None),
        }
    }

    pub fn add_account(&self, account: AccountInfo) {
        self.accounts
            .lock()
            .unwrap()
            .insert(account.address, account);
    }

    fn envelope(&self, parameter: ContractParameter, permission_id: i32, fee_limit: i64) -> TransactionJson {
        let raw = RawTransactionData {
            ref_block_bytes: vec![0x5e, 0x4b],
            ref_block_num: 0,
            ref_block_hash: vec![0xe3, 0xd1, 0xe2, 0xf2, 0xba, 0x5f, 0xa3, 0xb2],
            expiration: self.now_ms + NODE_EXPIRATION_MS,
            data: vec![],
            contract: ContractCall::new(parameter, permission_id),
            timestamp: self.now_ms,
            fee_limit,
        };
        TransactionJson::from(Transaction::new(raw))
    }
}

#[async_trait]
impl ChainNode for MockNode {
    async fn create_transaction(
        &self,
        request: &TransferRequest,
    ) -> Result<TransactionJson, NodeError> {
        let amount = self.tamper_amount.lock().unwrap().unwrap_or(request.amount);
        Ok(self.envelope(
            ContractParameter::Transfer(TransferContract {
                owner_address: request.owner_address,
                to_address: request.to_address,
                amount,
            }),
            request.permission_id,
            0,
        ))
    }

    async fn trigger_smart_contract(
        &self,
        request: &TriggerRequest,
    ) -> Result<TransactionJson, NodeError> {
        let mut data = function_selector(&request.function_selector).to_vec();
        data.extend(
            hex::decode(&request.parameter)
                .map_err(|e| NodeError::InvalidResponse(e.to_string()))?,
        );
        Ok(self.envelope(
            ContractParameter::TriggerSmartContract(TriggerSmartContract {
                owner_address: request.owner_address,
                contract_address: request.contract_address,
                call_value: request.call_value,
                data,
            }),
            request.permission_id,
            request.fee_limit,
        ))
    }

    async fn account_permission_update(
        &self,
        request: &PermissionUpdateRequest,
    ) -> Result<TransactionJson, NodeError> {
        Ok(self.envelope(
            ContractParameter::AccountPermissionUpdate(AccountPermissionUpdateContract {
                owner_address: request.owner_address,
                owner: request.owner.clone(),
                witness: request.witness.clone(),
                actives: request.actives.clone(),
            }),
            0,
            0,
        ))
    }

    async fn get_account(&self, address: &Address) -> Result<AccountInfo, NodeError> {
        self.accounts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or(NodeError::AccountNotFound(*address))
    }

    async fn trigger_constant_contract(
        &self,
        request: &TriggerRequest,
    ) -> Result<Vec<Vec<u8>>, NodeError> {
        let holder_word =
            hex::decode(&request.parameter).map_err(|e| NodeError::InvalidResponse(e.to_string()))?;
        let balances = self.token_balances.lock().unwrap();
        let balance = balances
            .iter()
            .find(|(address, _)| holder_word.ends_with(&address.as_bytes()[1..]))
            .map(|(_, balance)| *balance)
            .unwrap_or(0);

        let mut word = vec![0u8; 32];
        word[24..].copy_from_slice(&balance.to_be_bytes());
        Ok(vec![word])
    }

    async fn broadcast_transaction(&self, transaction: &Transaction) -> Result<TxId, NodeError> {
        if let Some(error) = self.broadcast_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.broadcasts.lock().unwrap().push(transaction.clone());
        Ok(*transaction.tx_id())
    }

    async fn get_transaction_info(
        &self,
        tx_id: &TxId,
    ) -> Result<Option<TransactionInfo>, NodeError> {
        Ok(self.infos.lock().unwrap().get(tx_id).cloned())
    }
}
