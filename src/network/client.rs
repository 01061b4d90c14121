//! HTTP chain node client
//!
//! Implements [`ChainNode`] over the node's `/wallet/*` JSON API.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::message::{
    parse_broadcast_response, parse_constant_response, parse_transaction_response, AccountJson,
    BroadcastResponse, ConstantCallResponse, NodeError, TransactionInfoJson,
};
use super::node::{
    AccountInfo, ChainNode, PermissionUpdateRequest, TransactionInfo, TransferRequest,
    TriggerRequest,
};
use crate::config::ClientConfig;
use crate::core::{Transaction, TransactionJson, TxId};
use crate::crypto::Address;

/// Chain node reached over HTTP
pub struct HttpNode {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpNode {
    /// Create a client for the configured node
    pub fn new(config: &ClientConfig) -> Result<Self, NodeError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| NodeError::Communication(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.node_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body and return the parsed JSON response
    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, NodeError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("TRON-PRO-API-KEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NodeError::Communication(format!("{}: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(NodeError::Communication(format!(
                "{} returned {}: {}",
                path, status, error_text
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| NodeError::Communication(e.to_string()))?;

        serde_json::from_str(&text)
            .map_err(|e| NodeError::InvalidResponse(format!("{}: {} ({})", path, e, text)))
    }

    async fn post_as<B, T>(&self, path: &str, body: &B) -> Result<T, NodeError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let value = self.post(path, body).await?;
        serde_json::from_value(value).map_err(|e| NodeError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChainNode for HttpNode {
    async fn create_transaction(
        &self,
        request: &TransferRequest,
    ) -> Result<TransactionJson, NodeError> {
        let response = self.post("/wallet/createtransaction", request).await?;
        parse_transaction_response(response)
    }

    async fn trigger_smart_contract(
        &self,
        request: &TriggerRequest,
    ) -> Result<TransactionJson, NodeError> {
        let response = self.post("/wallet/triggersmartcontract", request).await?;
        parse_transaction_response(response)
    }

    async fn account_permission_update(
        &self,
        request: &PermissionUpdateRequest,
    ) -> Result<TransactionJson, NodeError> {
        let response = self.post("/wallet/accountpermissionupdate", request).await?;
        parse_transaction_response(response)
    }

    async fn get_account(&self, address: &Address) -> Result<AccountInfo, NodeError> {
        let account: AccountJson = self
            .post_as("/wallet/getaccount", &json!({ "address": address.to_hex() }))
            .await?;
        AccountInfo::from_json(*address, account)
    }

    async fn trigger_constant_contract(
        &self,
        request: &TriggerRequest,
    ) -> Result<Vec<Vec<u8>>, NodeError> {
        let response: ConstantCallResponse = self
            .post_as("/wallet/triggerconstantcontract", request)
            .await?;
        parse_constant_response(response)
    }

    async fn broadcast_transaction(&self, transaction: &Transaction) -> Result<TxId, NodeError> {
        let response: BroadcastResponse = self
            .post_as("/wallet/broadcasttransaction", transaction)
            .await?;
        let txid = parse_broadcast_response(response)?;
        log::info!("Node accepted transaction {}", txid);
        txid.parse().map_err(NodeError::from)
    }

    async fn get_transaction_info(
        &self,
        tx_id: &TxId,
    ) -> Result<Option<TransactionInfo>, NodeError> {
        let info: TransactionInfoJson = self
            .post_as(
                "/wallet/gettransactioninfobyid",
                &json!({ "value": tx_id.to_hex() }),
            )
            .await?;
        Ok(TransactionInfo::from_json(*tx_id, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let config = ClientConfig {
            node_url: "https://nile.trongrid.io/".to_string(),
            ..ClientConfig::default()
        };
        let node = HttpNode::new(&config).unwrap();
        assert_eq!(node.base_url(), "https://nile.trongrid.io");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_communication_error() {
        let config = ClientConfig {
            node_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
            ..ClientConfig::default()
        };
        let node = HttpNode::new(&config).unwrap();
        let address = crate::crypto::KeyPair::generate().address();

        assert!(matches!(
            node.get_account(&address).await,
            Err(NodeError::Communication(_))
        ));
    }
}
