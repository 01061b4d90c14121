//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

/// Public mainnet HTTP API
pub const DEFAULT_NODE_URL: &str = "https://api.trongrid.io";

/// Node request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Seconds added to a node-provided expiration so co-signers have time to sign
pub const DEFAULT_EXPIRATION_EXTENSION_SECS: i64 = 300;

/// Fee limit for token transfers, in sun (100 TRX)
pub const DEFAULT_TOKEN_FEE_LIMIT: i64 = 100_000_000;

/// Default data directory
pub const DEFAULT_DATA_DIR: &str = ".multisig_data";

/// Engine and node client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the node HTTP API
    pub node_url: String,
    /// Sent as `TRON-PRO-API-KEY` when set
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub expiration_extension_secs: i64,
    pub token_fee_limit: i64,
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            api_key: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            expiration_extension_secs: DEFAULT_EXPIRATION_EXTENSION_SECS,
            token_fee_limit: DEFAULT_TOKEN_FEE_LIMIT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl ClientConfig {
    pub fn with_node_url(mut self, node_url: &str) -> Self {
        self.node_url = node_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding pending transaction files
    pub fn pending_dir(&self) -> PathBuf {
        self.data_dir.join("pending")
    }
}
