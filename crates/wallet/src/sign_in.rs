//! Redirect-based sign-in through the web wallet.
//!
//! A fresh access key is parked in the key store as pending, the wallet is
//! asked to add it to the user's account, and the redirect back tells us
//! which account that was.

use std::time::Duration;

use {
    chroma_config::{NetworkConfig, WalletConfig},
    chroma_rpc::{KeyPair, PublicKey, RpcClient, RpcError},
    chroma_session::{SignInError, SignInRequest},
    tracing::{info, warn},
    url::Url,
};

use crate::{
    callback::{CallbackServer, FAILURE_PATH, SUCCESS_PATH, WalletRedirect},
    store::{AuthData, AuthStore, KeyStore, pending_account},
};

/// Wallet login page asking for a function-call key on `contract_id`.
pub fn login_url(
    wallet_url: &str,
    callback_base: &str,
    contract_id: &str,
    public_key: &PublicKey,
    method_names: &[String],
) -> Result<Url, SignInError> {
    let base = wallet_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/login/"))
        .map_err(|e| SignInError::Redirect(format!("invalid wallet url {wallet_url}: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("success_url", &format!("{callback_base}{SUCCESS_PATH}"))
            .append_pair("failure_url", &format!("{callback_base}{FAILURE_PATH}"))
            .append_pair("contract_id", contract_id)
            .append_pair("public_key", &public_key.to_string());
        for method in method_names {
            query.append_pair("methodNames", method);
        }
    }
    Ok(url)
}

/// Everything a sign-in touches.
pub(crate) struct SignInFlow<'a> {
    pub network: &'a NetworkConfig,
    pub wallet: &'a WalletConfig,
    pub rpc: &'a RpcClient,
    pub keys: &'a KeyStore,
    pub auth: &'a AuthStore,
}

impl SignInFlow<'_> {
    /// Run the redirect to completion; returns the signed-in account.
    pub async fn run(
        &self,
        request: &SignInRequest,
        launch: impl FnOnce(&Url),
    ) -> Result<String, SignInError> {
        self.ensure_contract_exists(&request.contract_id).await?;

        let key = KeyPair::random();
        let public_key = key.public_key();
        let network_id = &self.network.network_id;
        self.keys
            .set_key(network_id, &pending_account(&public_key), &key)
            .map_err(|e| SignInError::Storage(e.to_string()))?;

        let outcome = self.redirect(request, &public_key, launch).await;
        let account_id = match outcome {
            Ok(account_id) => account_id,
            Err(e) => {
                if let Err(cleanup) = self
                    .keys
                    .remove_key(network_id, &pending_account(&public_key))
                {
                    warn!(error = %cleanup, "failed to drop pending key");
                }
                return Err(e);
            },
        };

        info!(account = %account_id, network = %network_id, "signed in");
        Ok(account_id)
    }

    async fn ensure_contract_exists(&self, contract_id: &str) -> Result<(), SignInError> {
        match self.rpc.view_account(contract_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.downcast_ref::<RpcError>().is_some_and(RpcError::is_unknown_account) => {
                Err(SignInError::ContractNotFound(contract_id.to_string()))
            },
            Err(e) => Err(SignInError::Redirect(format!(
                "could not look up contract {contract_id}: {e:#}"
            ))),
        }
    }

    async fn redirect(
        &self,
        request: &SignInRequest,
        public_key: &PublicKey,
        launch: impl FnOnce(&Url),
    ) -> Result<String, SignInError> {
        let server = CallbackServer::bind(self.wallet.callback_port).await?;
        let url = login_url(
            &self.network.wallet_url,
            &server.base_url()?,
            &request.contract_id,
            public_key,
            &request.method_names,
        )?;
        launch(&url);

        let timeout = Duration::from_secs(self.wallet.sign_in_timeout_secs);
        match server.wait(timeout).await? {
            WalletRedirect::Denied { code, message } => {
                Err(SignInError::Rejected(if message.is_empty() {
                    code
                } else {
                    format!("{code}: {message}")
                }))
            },
            WalletRedirect::Approved {
                account_id,
                public_key: returned_key,
                all_keys,
            } => {
                let returned_key = match returned_key {
                    Some(text) => text
                        .parse::<PublicKey>()
                        .map_err(|e| SignInError::Redirect(format!("bad public_key: {e}")))?,
                    None => *public_key,
                };
                self.keys
                    .promote_pending(&self.network.network_id, &returned_key, &account_id)
                    .map_err(|e| SignInError::Storage(e.to_string()))?;
                self.auth
                    .save(&AuthData {
                        account_id: account_id.clone(),
                        all_keys,
                    })
                    .map_err(|e| SignInError::Storage(e.to_string()))?;
                Ok(account_id)
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_carries_callbacks_and_methods() {
        let key = KeyPair::random().public_key();
        let url = login_url(
            "https://wallet.testnet.near.org/",
            "http://127.0.0.1:1456",
            "paint.testnet",
            &key,
            &["set".to_string(), "reset".to_string()],
        )
        .unwrap();

        assert_eq!(url.path(), "/login/");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let value = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(value("success_url"), "http://127.0.0.1:1456/auth/success");
        assert_eq!(value("failure_url"), "http://127.0.0.1:1456/auth/failure");
        assert_eq!(value("contract_id"), "paint.testnet");
        assert_eq!(value("public_key"), key.to_string());
        let methods: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k == "methodNames")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(methods, vec!["set", "reset"]);
    }

    #[test]
    fn login_url_rejects_garbage_wallet() {
        let key = KeyPair::random().public_key();
        assert!(matches!(
            login_url("not a url", "http://127.0.0.1:1", "c", &key, &[]),
            Err(SignInError::Redirect(_))
        ));
    }
}
