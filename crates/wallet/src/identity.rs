use std::sync::Arc;

use {
    async_trait::async_trait,
    chroma_config::WalletConfig,
    chroma_rpc::{RpcError, available_balance},
    chroma_session::{Account, IdentityProvider, NetworkError, SignInError, SignInRequest},
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    gateway::NearConnection,
    sign_in::SignInFlow,
    store::{AuthStore, KeyStore},
};

/// Shows the wallet login page to the user.
pub type BrowserLauncher = Arc<dyn Fn(&Url) + Send + Sync>;

/// Identity backed by the web wallet and the local credential files.
#[derive(Clone)]
pub struct WalletConnection {
    wallet: WalletConfig,
    keys: KeyStore,
    auth: AuthStore,
    launcher: BrowserLauncher,
}

impl WalletConnection {
    /// Credentials under the default config directory.
    pub fn new(wallet: WalletConfig, launcher: BrowserLauncher) -> Self {
        let auth = AuthStore::new(&wallet.app_key_prefix);
        Self::with_stores(wallet, KeyStore::new(), auth, launcher)
    }

    pub fn with_stores(
        wallet: WalletConfig,
        keys: KeyStore,
        auth: AuthStore,
        launcher: BrowserLauncher,
    ) -> Self {
        Self {
            wallet,
            keys,
            auth,
            launcher,
        }
    }
}

impl std::fmt::Debug for WalletConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConnection")
            .field("wallet", &self.wallet)
            .field("keys", &self.keys)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

fn network_error(e: anyhow::Error, account_id: &str) -> NetworkError {
    match e.downcast_ref::<RpcError>() {
        Some(rpc) if rpc.is_unknown_account() => NetworkError::AccountNotFound(account_id.into()),
        _ => NetworkError::Rpc(format!("{e:#}")),
    }
}

#[async_trait]
impl IdentityProvider for WalletConnection {
    type Connection = NearConnection;

    fn current_account_id(&self, _connection: &NearConnection) -> Option<String> {
        self.auth.account_id()
    }

    async fn get_account(
        &self,
        connection: &NearConnection,
        account_id: &str,
    ) -> Result<Account, NetworkError> {
        let view = connection
            .rpc
            .view_account(account_id)
            .await
            .map_err(|e| network_error(e, account_id))?;
        let cost_per_byte = connection
            .rpc
            .storage_amount_per_byte()
            .await
            .map_err(|e| NetworkError::Rpc(format!("{e:#}")))?;
        let balance_available = available_balance(&view, &cost_per_byte)
            .map_err(|e| NetworkError::Malformed(format!("{e:#}")))?;

        debug!(account = %account_id, available = %balance_available, "fetched account");
        Ok(Account {
            identifier: account_id.to_string(),
            balance_available,
        })
    }

    async fn sign_in(
        &self,
        connection: &NearConnection,
        request: SignInRequest,
    ) -> Result<(), SignInError> {
        let flow = SignInFlow {
            network: &connection.config,
            wallet: &self.wallet,
            rpc: &connection.rpc,
            keys: &self.keys,
            auth: &self.auth,
        };
        flow.run(&request, |url| (self.launcher)(url))
            .await
            .map(|_| ())
    }

    async fn sign_out(&self, _connection: &NearConnection) {
        if let Err(e) = self.auth.clear() {
            warn!(error = %e, "failed to clear wallet auth data");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        chroma_config::NetworkConfig,
        chroma_rpc::RpcClient,
        mockito::{Matcher, ServerGuard},
        serde_json::json,
    };

    use super::*;

    const ONE_NEAR: &str = "1000000000000000000000000";

    struct Fixture {
        _dir: tempfile::TempDir,
        server: ServerGuard,
        keys: KeyStore,
        auth: AuthStore,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let keys = KeyStore::with_path(dir.path().join("keystore.json"));
            let auth = AuthStore::with_path(dir.path().join("test_wallet_auth_key.json"));
            Self {
                _dir: dir,
                server: mockito::Server::new_async().await,
                keys,
                auth,
            }
        }

        fn connection(&self) -> NearConnection {
            NearConnection {
                config: NetworkConfig {
                    node_url: self.server.url(),
                    wallet_url: "https://wallet.example".into(),
                    ..NetworkConfig::default()
                },
                rpc: RpcClient::new(&self.server.url()).unwrap(),
            }
        }

        fn provider(&self, launcher: BrowserLauncher) -> WalletConnection {
            let wallet = WalletConfig {
                app_key_prefix: "test".into(),
                callback_port: 0,
                sign_in_timeout_secs: 5,
            };
            WalletConnection::with_stores(wallet, self.keys.clone(), self.auth.clone(), launcher)
        }

        async fn mock_account(&mut self, account_id: &str) {
            self.server
                .mock("POST", "/")
                .match_body(Matcher::PartialJson(json!({
                    "method": "query",
                    "params": {"request_type": "view_account", "account_id": account_id}
                })))
                .with_body(
                    json!({"jsonrpc": "2.0", "id": "chroma-1", "result": {
                        "amount": ONE_NEAR,
                        "locked": "0",
                        "storage_usage": 1000,
                        "block_height": 1
                    }})
                    .to_string(),
                )
                .create_async()
                .await;
        }

        async fn mock_unknown_account(&mut self, account_id: &str) {
            self.server
                .mock("POST", "/")
                .match_body(Matcher::PartialJson(json!({
                    "params": {"account_id": account_id}
                })))
                .with_body(
                    json!({"jsonrpc": "2.0", "id": "chroma-1", "error": {
                        "code": -32000,
                        "message": "Server error",
                        "cause": {"name": "UNKNOWN_ACCOUNT"}
                    }})
                    .to_string(),
                )
                .create_async()
                .await;
        }

        async fn mock_storage_price(&mut self) {
            self.server
                .mock("POST", "/")
                .match_body(Matcher::PartialJson(
                    json!({"method": "EXPERIMENTAL_protocol_config"}),
                ))
                .with_body(
                    json!({"jsonrpc": "2.0", "id": "chroma-1", "result": {
                        "runtime_config": {"storage_amount_per_byte": "10000000000000000000"}
                    }})
                    .to_string(),
                )
                .create_async()
                .await;
        }
    }

    fn no_browser() -> BrowserLauncher {
        Arc::new(|_: &Url| {})
    }

    /// A launcher that plays the wallet: follows `success_url` or
    /// `failure_url` from the login page it is given.
    fn wallet_answering(query: &'static str, approve: bool) -> BrowserLauncher {
        Arc::new(move |url: &Url| {
            let target = if approve { "success_url" } else { "failure_url" };
            let callback = url
                .query_pairs()
                .find(|(k, _)| k == target)
                .map(|(_, v)| v.into_owned())
                .unwrap();
            let public_key = url
                .query_pairs()
                .find(|(k, _)| k == "public_key")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            let mut redirect = Url::parse(&callback).unwrap();
            redirect.set_query(Some(query));
            if approve {
                redirect
                    .query_pairs_mut()
                    .append_pair("public_key", &public_key)
                    .append_pair("all_keys", &public_key);
            }
            tokio::spawn(async move {
                reqwest::get(redirect).await.unwrap();
            });
        })
    }

    fn request() -> SignInRequest {
        SignInRequest {
            contract_id: "paint.testnet".into(),
            method_names: vec!["set".into()],
        }
    }

    #[tokio::test]
    async fn account_balance_is_available_balance() {
        let mut fx = Fixture::new().await;
        fx.mock_account("alice.testnet").await;
        fx.mock_storage_price().await;

        let account = fx
            .provider(no_browser())
            .get_account(&fx.connection(), "alice.testnet")
            .await
            .unwrap();
        assert_eq!(account, Account {
            identifier: "alice.testnet".into(),
            balance_available: "990000000000000000000000".into(),
        });
    }

    #[tokio::test]
    async fn unknown_account_is_reported() {
        let mut fx = Fixture::new().await;
        fx.mock_unknown_account("ghost.testnet").await;

        let err = fx
            .provider(no_browser())
            .get_account(&fx.connection(), "ghost.testnet")
            .await
            .unwrap_err();
        assert_eq!(err, NetworkError::AccountNotFound("ghost.testnet".into()));
    }

    #[tokio::test]
    async fn approved_sign_in_stores_credential() {
        let mut fx = Fixture::new().await;
        fx.mock_account("paint.testnet").await;
        let provider = fx.provider(wallet_answering("account_id=alice.testnet", true));
        let conn = fx.connection();
        assert_eq!(provider.current_account_id(&conn), None);

        provider.sign_in(&conn, request()).await.unwrap();

        assert_eq!(provider.current_account_id(&conn).as_deref(), Some("alice.testnet"));
        assert_eq!(fx.keys.accounts("testnet").unwrap(), vec!["alice.testnet"]);
        let stored = fx.keys.get_key("testnet", "alice.testnet").unwrap().unwrap();
        assert_eq!(fx.auth.load().unwrap().all_keys, vec![
            stored.public_key().to_string()
        ]);
    }

    #[tokio::test]
    async fn rejected_sign_in_leaves_no_credential() {
        let mut fx = Fixture::new().await;
        fx.mock_account("paint.testnet").await;
        let provider = fx.provider(wallet_answering(
            "errorCode=userRejected&errorMessage=no",
            false,
        ));
        let conn = fx.connection();

        let err = provider.sign_in(&conn, request()).await.unwrap_err();
        assert_eq!(err, SignInError::Rejected("userRejected: no".into()));
        assert_eq!(provider.current_account_id(&conn), None);
        assert!(fx.keys.accounts("testnet").unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_contract_stops_sign_in() {
        let mut fx = Fixture::new().await;
        fx.mock_unknown_account("paint.testnet").await;
        let provider = fx.provider(no_browser());

        let err = provider
            .sign_in(&fx.connection(), request())
            .await
            .unwrap_err();
        assert_eq!(err, SignInError::ContractNotFound("paint.testnet".into()));
        assert!(fx.keys.accounts("testnet").unwrap().is_empty());
    }

    #[tokio::test]
    async fn sign_out_keeps_access_key() {
        let mut fx = Fixture::new().await;
        fx.mock_account("paint.testnet").await;
        let provider = fx.provider(wallet_answering("account_id=alice.testnet", true));
        let conn = fx.connection();
        provider.sign_in(&conn, request()).await.unwrap();

        provider.sign_out(&conn).await;

        assert_eq!(provider.current_account_id(&conn), None);
        assert!(fx.keys.get_key("testnet", "alice.testnet").unwrap().is_some());
    }
}
