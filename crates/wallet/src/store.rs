//! On-disk credentials under `~/.config/chroma/`.
//!
//! [`KeyStore`] keeps ed25519 access keys per network and account;
//! [`AuthStore`] keeps the wallet's answer to the last successful sign-in.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use {
    anyhow::{Context, Result},
    chroma_rpc::{KeyPair, PublicKey},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    tracing::{debug, warn},
};

/// Account-name prefix for keys waiting on a wallet redirect.
pub const PENDING_KEY_PREFIX: &str = "pending_key";

/// `network_id -> account_id -> secret key`.
type KeyFile = BTreeMap<String, BTreeMap<String, String>>;

fn store_dir() -> PathBuf {
    chroma_config::config_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match std::fs::read_to_string(path) {
        Ok(data) => {
            serde_json::from_str(&data).with_context(|| format!("corrupt {}", path.display()))
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(value)?;
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Account slot of a key generated for a sign-in that has not completed.
pub fn pending_account(public_key: &PublicKey) -> String {
    format!("{PENDING_KEY_PREFIX}{public_key}")
}

/// File-based key store at `~/.config/chroma/keystore.json`.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::with_path(store_dir().join("keystore.json"))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_key(&self, network_id: &str, account_id: &str, key: &KeyPair) -> Result<()> {
        let mut keys: KeyFile = read_json(&self.path)?;
        keys.entry(network_id.to_string())
            .or_default()
            .insert(account_id.to_string(), key.secret_key_string());
        write_json(&self.path, &keys)?;
        debug!(network = %network_id, account = %account_id, "stored access key");
        Ok(())
    }

    pub fn get_key(&self, network_id: &str, account_id: &str) -> Result<Option<KeyPair>> {
        let keys: KeyFile = read_json(&self.path)?;
        keys.get(network_id)
            .and_then(|accounts| accounts.get(account_id))
            .map(|secret| {
                secret
                    .parse()
                    .with_context(|| format!("stored key for {account_id} is invalid"))
            })
            .transpose()
    }

    pub fn remove_key(&self, network_id: &str, account_id: &str) -> Result<()> {
        let mut keys: KeyFile = read_json(&self.path)?;
        let Some(accounts) = keys.get_mut(network_id) else {
            return Ok(());
        };
        if accounts.remove(account_id).is_none() {
            return Ok(());
        }
        if accounts.is_empty() {
            keys.remove(network_id);
        }
        write_json(&self.path, &keys)
    }

    /// Accounts holding a key on `network_id`, pending slots included.
    pub fn accounts(&self, network_id: &str) -> Result<Vec<String>> {
        let keys: KeyFile = read_json(&self.path)?;
        Ok(keys
            .get(network_id)
            .map(|accounts| accounts.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Move a pending key into `account_id`'s permanent slot.
    pub fn promote_pending(
        &self,
        network_id: &str,
        public_key: &PublicKey,
        account_id: &str,
    ) -> Result<()> {
        let pending = pending_account(public_key);
        let key = self
            .get_key(network_id, &pending)?
            .with_context(|| format!("no pending key for {public_key}"))?;
        self.set_key(network_id, account_id, &key)?;
        self.remove_key(network_id, &pending)
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// What the wallet reported for the signed-in account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub account_id: String,
    #[serde(default)]
    pub all_keys: Vec<String>,
}

/// Auth data at `~/.config/chroma/<app_key_prefix>_wallet_auth_key.json`.
#[derive(Debug, Clone)]
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    pub fn new(app_key_prefix: &str) -> Self {
        Self::with_path(store_dir().join(format!("{app_key_prefix}_wallet_auth_key.json")))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Stored auth data. An unreadable or corrupt file counts as signed out
    /// and is logged.
    pub fn load(&self) -> Option<AuthData> {
        match read_json::<Option<AuthData>>(&self.path) {
            Ok(auth) => auth,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %format!("{e:#}"),
                    "ignoring wallet auth data"
                );
                None
            },
        }
    }

    /// Signed-in account, if a credential is present.
    pub fn account_id(&self) -> Option<String> {
        self.load()
            .map(|auth| auth.account_id)
            .filter(|id| !id.is_empty())
    }

    pub fn save(&self, auth: &AuthData) -> Result<()> {
        write_json(&self.path, auth)
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}
