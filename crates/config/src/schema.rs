/// Config schema types (network endpoints, target contract, wallet sign-in).
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    pub network: NetworkConfig,
    pub contract: ContractConfig,
    pub wallet: WalletConfig,
}

/// Static, non-secret endpoints of the ledger network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Chain identifier reported by the node (e.g. "testnet").
    pub network_id: String,
    /// JSON-RPC endpoint.
    pub node_url: String,
    /// Base URL of the web wallet used for redirect sign-in.
    pub wallet_url: String,
    pub helper_url: String,
    pub explorer_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_id: "testnet".into(),
            node_url: "https://rpc.testnet.near.org".into(),
            wallet_url: "https://wallet.testnet.near.org".into(),
            helper_url: "https://helper.testnet.near.org".into(),
            explorer_url: "https://explorer.testnet.near.org".into(),
        }
    }
}

/// The remote contract holding the color triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub contract_id: String,
    /// Read-only methods the binding may call.
    pub view_methods: Vec<String>,
    /// State-changing methods the binding may invoke.
    pub change_methods: Vec<String>,
    /// Method returning the current `[r, g, b]` triple.
    pub read_method: String,
    /// Method accepting `{r, g, b}`.
    pub write_method: String,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            contract_id: "frontend-test-1.badconfig.testnet".into(),
            view_methods: vec!["get".into()],
            change_methods: vec!["set".into()],
            read_method: "get".into(),
            write_method: "set".into(),
        }
    }
}

/// Local side of the wallet redirect sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Prefix of the auth-data file kept in the credential store.
    pub app_key_prefix: String,
    /// Port of the loopback server receiving the wallet redirect.
    pub callback_port: u16,
    /// How long to wait for the wallet to redirect back.
    pub sign_in_timeout_secs: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            app_key_prefix: "my-connection".into(),
            callback_port: 1456,
            sign_in_timeout_secs: 300,
        }
    }
}

impl ChromaConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("network.node_url", &self.network.node_url),
            ("network.wallet_url", &self.network.wallet_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| anyhow::anyhow!("{name} is not a valid URL ({value}): {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{name} must be an http(s) URL, got {value}");
            }
        }
        if self.network.network_id.trim().is_empty() {
            anyhow::bail!("network.network_id must not be empty");
        }

        let contract = &self.contract;
        if contract.contract_id.trim().is_empty() {
            anyhow::bail!("contract.contract_id must not be empty");
        }
        if !contract.view_methods.contains(&contract.read_method) {
            anyhow::bail!(
                "contract.read_method '{}' is not declared in view_methods",
                contract.read_method
            );
        }
        if !contract.change_methods.contains(&contract.write_method) {
            anyhow::bail!(
                "contract.write_method '{}' is not declared in change_methods",
                contract.write_method
            );
        }
        Ok(())
    }
}
