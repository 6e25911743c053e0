//! JSON-RPC client for a single node over HTTP.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    anyhow::{Context, Result},
    base64::{Engine, engine::general_purpose::STANDARD},
    serde::de::DeserializeOwned,
    serde_json::json,
    tracing::{debug, trace},
};

use crate::{
    transaction::SignedTransaction,
    types::{
        AccessKeyView, AccountView, CallResult, JsonRpcRequest, JsonRpcResponse, NodeStatus,
        RpcError,
    },
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cheap to clone; clones share the HTTP pool and the request id counter.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(node_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            url: node_url.to_string(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a request and return its `result`.
    ///
    /// Node-side failures come back as [`RpcError`] inside the `anyhow` chain,
    /// so callers can `downcast_ref` to inspect the cause.
    pub async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);
        trace!(method = %method, id = %req.id, "client -> node");

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("{method} request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
            anyhow::bail!("{method} request to {} returned HTTP {status}", self.url);
        }

        let resp: JsonRpcResponse = resp
            .json()
            .await
            .with_context(|| format!("invalid {method} response"))?;

        if let Some(err) = resp.error {
            debug!(method = %method, error = %err, "node returned an error");
            return Err(err.into());
        }
        let result = resp
            .result
            .with_context(|| format!("{method} returned no result"))?;

        if let Some(message) = result.get("error").and_then(|e| e.as_str()) {
            return Err(RpcError::from_query_error(message).into());
        }
        Ok(result)
    }

    async fn request_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let value = self.request(method, params).await?;
        serde_json::from_value(value).with_context(|| format!("failed to parse {method} result"))
    }

    pub async fn status(&self) -> Result<NodeStatus> {
        self.request_typed("status", json!([])).await
    }

    pub async fn view_account(&self, account_id: &str) -> Result<AccountView> {
        self.request_typed(
            "query",
            json!({
                "request_type": "view_account",
                "finality": "final",
                "account_id": account_id,
            }),
        )
        .await
    }

    pub async fn view_access_key(
        &self,
        account_id: &str,
        public_key: &str,
    ) -> Result<AccessKeyView> {
        self.request_typed(
            "query",
            json!({
                "request_type": "view_access_key",
                "finality": "final",
                "account_id": account_id,
                "public_key": public_key,
            }),
        )
        .await
    }

    /// Run a view method with JSON arguments.
    pub async fn call_function(
        &self,
        contract_id: &str,
        method_name: &str,
        args: &serde_json::Value,
    ) -> Result<CallResult> {
        let args = serde_json::to_vec(args)?;
        self.request_typed(
            "query",
            json!({
                "request_type": "call_function",
                "finality": "final",
                "account_id": contract_id,
                "method_name": method_name,
                "args_base64": STANDARD.encode(args),
            }),
        )
        .await
    }

    /// Storage staking price per byte, as a yocto decimal string.
    pub async fn storage_amount_per_byte(&self) -> Result<String> {
        let config = self
            .request("EXPERIMENTAL_protocol_config", json!({ "finality": "final" }))
            .await?;
        config
            .pointer("/runtime_config/storage_amount_per_byte")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .context("protocol config has no runtime_config.storage_amount_per_byte")
    }

    /// Submit a signed transaction and wait for its final outcome.
    ///
    /// An outcome whose `status` is a `Failure` is returned as an error.
    pub async fn broadcast_tx_commit(&self, tx: &SignedTransaction) -> Result<serde_json::Value> {
        let outcome = self
            .request("broadcast_tx_commit", json!([tx.to_base64()?]))
            .await?;
        if let Some(failure) = outcome.pointer("/status/Failure") {
            anyhow::bail!("transaction failed: {failure}");
        }
        Ok(outcome)
    }
}
