//! Ledger-backed implementations of the session collaborators: the node
//! connection, the wallet redirect sign-in with its on-disk credentials, and
//! contract calls signed with the stored access key.

pub mod callback;
pub mod contract;
pub mod gateway;
pub mod identity;
pub mod sign_in;
pub mod store;

pub use {
    callback::{CallbackServer, WalletRedirect},
    contract::{RpcContractBinding, RpcContractProxy},
    gateway::{NearConnection, NearGateway},
    identity::{BrowserLauncher, WalletConnection},
    sign_in::login_url,
    store::{AuthData, AuthStore, KeyStore},
};
