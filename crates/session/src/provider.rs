//! Collaborators the session controller drives.
//!
//! Each trait is the narrow surface the controller needs; the RPC transport,
//! the wallet redirect and the on-disk credential store live behind them.

use std::collections::BTreeSet;

use {async_trait::async_trait, chroma_config::NetworkConfig};

use crate::{
    color::Rgb,
    error::{ConnectError, ContractCallError, NetworkError, SignInError},
};

/// An authenticated identity with its spendable balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Opaque account name (e.g. `alice.testnet`).
    pub identifier: String,
    /// Smallest-unit amount as a decimal string; formatted only at display time.
    pub balance_available: String,
}

/// Read and write method names declared for a contract binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractMethods {
    pub read: BTreeSet<String>,
    pub write: BTreeSet<String>,
}

impl ContractMethods {
    pub fn new<R, W>(read: R, write: W) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        W: IntoIterator,
        W::Item: Into<String>,
    {
        Self {
            read: read.into_iter().map(Into::into).collect(),
            write: write.into_iter().map(Into::into).collect(),
        }
    }
}

/// What the wallet should scope the new credential to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInRequest {
    pub contract_id: String,
    /// Change methods the access key may call. Empty means all.
    pub method_names: Vec<String>,
}

/// Opens the shared, long-lived connection to the ledger network.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    type Connection: Send + Sync;

    async fn connect(&self, config: &NetworkConfig) -> Result<Self::Connection, ConnectError>;
}

/// Local credential lookup plus the redirect-based sign-in and sign-out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    type Connection: Send + Sync;

    /// Account id of the stored credential, if any. Never touches the network.
    fn current_account_id(&self, connection: &Self::Connection) -> Option<String>;

    async fn get_account(
        &self,
        connection: &Self::Connection,
        account_id: &str,
    ) -> Result<Account, NetworkError>;

    /// Run the wallet redirect to completion. On `Ok` a credential is stored
    /// and every in-memory session state must be treated as stale.
    async fn sign_in(
        &self,
        connection: &Self::Connection,
        request: SignInRequest,
    ) -> Result<(), SignInError>;

    async fn sign_out(&self, connection: &Self::Connection);
}

/// Creates contract bindings for an authenticated account.
pub trait ContractProxy: Send + Sync {
    type Connection: Send + Sync;
    type Binding: ContractBinding;

    fn bind(
        &self,
        connection: &Self::Connection,
        account: &Account,
        contract_id: &str,
        methods: ContractMethods,
    ) -> Self::Binding;
}

/// Typed calls against one contract on behalf of one account.
#[async_trait]
pub trait ContractBinding: Send + Sync {
    fn contract_id(&self) -> &str;

    async fn call(&self, method: &str) -> Result<Rgb, ContractCallError>;

    async fn invoke(&self, method: &str, payload: Rgb) -> Result<(), ContractCallError>;
}
