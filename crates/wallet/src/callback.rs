//! Loopback HTTP server that receives the wallet's redirect.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    axum::{
        Router,
        extract::{Query, State},
        response::Html,
        routing::get,
    },
    chroma_session::SignInError,
    tokio::{net::TcpListener, sync::oneshot},
    tracing::{debug, info, warn},
};

pub const SUCCESS_PATH: &str = "/auth/success";
pub const FAILURE_PATH: &str = "/auth/failure";

/// Where the wallet sent the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletRedirect {
    Approved {
        account_id: String,
        public_key: Option<String>,
        all_keys: Vec<String>,
    },
    Denied {
        code: String,
        message: String,
    },
}

type Slot = Arc<Mutex<Option<oneshot::Sender<WalletRedirect>>>>;

/// A bound callback listener. Binding happens before the wallet URL is opened
/// so a busy port fails fast.
pub struct CallbackServer {
    listener: TcpListener,
}

impl CallbackServer {
    pub async fn bind(port: u16) -> Result<Self, SignInError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| SignInError::Redirect(format!("cannot listen on port {port}: {e}")))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SignInError> {
        self.listener
            .local_addr()
            .map_err(|e| SignInError::Redirect(e.to_string()))
    }

    /// `http://127.0.0.1:<port>`, the base of the success and failure URLs.
    pub fn base_url(&self) -> Result<String, SignInError> {
        Ok(format!("http://{}", self.local_addr()?))
    }

    /// Serve until the first redirect arrives or `timeout` elapses.
    pub async fn wait(self, timeout: Duration) -> Result<WalletRedirect, SignInError> {
        let (tx, rx) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(tx)));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route(SUCCESS_PATH, get(on_success))
            .route(FAILURE_PATH, get(on_failure))
            .with_state(slot);

        let server = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(self.listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                warn!(error = %e, "callback server stopped");
            }
        });

        let outcome = tokio::time::timeout(timeout, rx).await;
        let _ = shutdown_tx.send(());
        if tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .is_err()
        {
            debug!("callback server did not drain in time");
        }

        match outcome {
            Ok(Ok(redirect)) => Ok(redirect),
            Ok(Err(_)) => Err(SignInError::Redirect("callback server closed".into())),
            Err(_) => Err(SignInError::Timeout),
        }
    }
}

fn deliver(slot: &Slot, redirect: WalletRedirect) {
    let sender = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    match sender {
        Some(tx) => {
            let _ = tx.send(redirect);
        },
        None => debug!("ignoring repeated wallet redirect"),
    }
}

async fn on_success(
    State(slot): State<Slot>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let Some(account_id) = params.get("account_id").filter(|id| !id.is_empty()) else {
        deliver(&slot, WalletRedirect::Denied {
            code: "MissingAccountId".into(),
            message: "wallet redirect carried no account_id".into(),
        });
        return Html(FAILURE_PAGE);
    };
    info!(account = %account_id, "wallet approved sign-in");

    let all_keys = params
        .get("all_keys")
        .map(|keys| {
            keys.split(',')
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    deliver(&slot, WalletRedirect::Approved {
        account_id: account_id.clone(),
        public_key: params.get("public_key").cloned(),
        all_keys,
    });
    Html(SUCCESS_PAGE)
}

async fn on_failure(
    State(slot): State<Slot>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let code = params
        .get("errorCode")
        .cloned()
        .unwrap_or_else(|| "userRejected".into());
    let message = params.get("errorMessage").cloned().unwrap_or_default();
    info!(code = %code, "wallet denied sign-in");
    deliver(&slot, WalletRedirect::Denied { code, message });
    Html(FAILURE_PAGE)
}

const SUCCESS_PAGE: &str =
    "<html><body><h2>Signed in.</h2><p>You can close this tab and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str =
    "<html><body><h2>Sign-in was not completed.</h2><p>Return to the terminal for details.</p></body></html>";

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn hit(base: String, path_and_query: &'static str) {
        let url = format!("{base}{path_and_query}");
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success());
    }

    #[tokio::test]
    async fn approved_redirect_is_delivered() {
        let server = CallbackServer::bind(0).await.unwrap();
        let base = server.base_url().unwrap();
        let client = tokio::spawn(hit(
            base,
            "/auth/success?account_id=alice.testnet&public_key=ed25519%3Aabc&all_keys=ed25519%3Aabc%2Ced25519%3Adef",
        ));

        let redirect = server.wait(Duration::from_secs(5)).await.unwrap();
        client.await.unwrap();
        assert_eq!(redirect, WalletRedirect::Approved {
            account_id: "alice.testnet".into(),
            public_key: Some("ed25519:abc".into()),
            all_keys: vec!["ed25519:abc".into(), "ed25519:def".into()],
        });
    }

    #[tokio::test]
    async fn denied_redirect_carries_error() {
        let server = CallbackServer::bind(0).await.unwrap();
        let base = server.base_url().unwrap();
        let client = tokio::spawn(hit(
            base,
            "/auth/failure?errorCode=userRejected&errorMessage=User%20rejected",
        ));

        let redirect = server.wait(Duration::from_secs(5)).await.unwrap();
        client.await.unwrap();
        assert_eq!(redirect, WalletRedirect::Denied {
            code: "userRejected".into(),
            message: "User rejected".into(),
        });
    }

    #[tokio::test]
    async fn success_without_account_is_denied() {
        let server = CallbackServer::bind(0).await.unwrap();
        let base = server.base_url().unwrap();
        let client = tokio::spawn(hit(base, "/auth/success"));

        let redirect = server.wait(Duration::from_secs(5)).await.unwrap();
        client.await.unwrap();
        assert!(matches!(redirect, WalletRedirect::Denied { code, .. } if code == "MissingAccountId"));
    }

    #[tokio::test]
    async fn no_redirect_times_out() {
        let server = CallbackServer::bind(0).await.unwrap();
        let err = server.wait(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err, SignInError::Timeout);
    }

    #[tokio::test]
    async fn busy_port_fails_to_bind() {
        let first = CallbackServer::bind(0).await.unwrap();
        let port = first.local_addr().unwrap().port();
        assert!(matches!(
            CallbackServer::bind(port).await,
            Err(SignInError::Redirect(_))
        ));
    }
}
