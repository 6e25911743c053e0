//! JSON-RPC 2.0 envelopes and the node's query result shapes.

use {
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: format!("chroma-{id}"),
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

/// Error object returned by the node.
#[derive(Debug, Clone, Deserialize, Error)]
#[error("rpc error {code}: {message}{}", detail(.cause, .data))]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Error class, e.g. `HANDLER_ERROR`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cause: Option<RpcErrorCause>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorCause {
    pub name: String,
    #[serde(default)]
    pub info: Option<serde_json::Value>,
}

impl RpcError {
    /// Build an error for a query that answered with `result.error` instead of
    /// a JSON-RPC error object (older nodes do this).
    pub fn from_query_error(message: &str) -> Self {
        Self {
            code: -32000,
            message: message.to_string(),
            data: None,
            name: None,
            cause: None,
        }
    }

    pub fn cause_name(&self) -> Option<&str> {
        self.cause.as_ref().map(|c| c.name.as_str())
    }

    pub fn is_unknown_account(&self) -> bool {
        self.cause_name() == Some("UNKNOWN_ACCOUNT")
            || self.message.contains("does not exist while viewing")
            || self
                .data
                .as_ref()
                .and_then(|d| d.as_str())
                .is_some_and(|d| d.contains("does not exist while viewing"))
    }

    pub fn is_unknown_access_key(&self) -> bool {
        self.cause_name() == Some("UNKNOWN_ACCESS_KEY")
            || self.message.contains("has never been observed on the node")
    }
}

fn detail(cause: &Option<RpcErrorCause>, data: &Option<serde_json::Value>) -> String {
    match (cause, data) {
        (Some(cause), _) => format!(" ({})", cause.name),
        (None, Some(serde_json::Value::String(data))) => format!(" ({data})"),
        _ => String::new(),
    }
}

/// `status` result (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    pub chain_id: String,
    #[serde(default)]
    pub sync_info: Option<SyncInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: u64,
    #[serde(default)]
    pub syncing: bool,
}

/// `query/view_account` result. Amounts are yocto-denominated decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountView {
    pub amount: String,
    pub locked: String,
    pub storage_usage: u64,
    #[serde(default)]
    pub code_hash: Option<String>,
    #[serde(default)]
    pub block_height: u64,
}

/// `query/view_access_key` result.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessKeyView {
    pub nonce: u64,
    /// Base58 hash of the block the key was viewed at.
    pub block_hash: String,
    #[serde(default)]
    pub permission: serde_json::Value,
}

/// `query/call_function` result.
#[derive(Debug, Clone, Deserialize)]
pub struct CallResult {
    pub result: Vec<u8>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl CallResult {
    /// Decode the returned bytes as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.result)
    }
}
