use thiserror::Error;

use crate::color::Channel;

/// The ledger network could not be reached or is not the one configured.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("network unreachable at {node_url}: {reason}")]
    Unreachable { node_url: String, reason: String },
    #[error("node reports chain '{actual}', expected '{expected}'")]
    WrongNetwork { expected: String, actual: String },
    #[error("invalid network configuration: {0}")]
    InvalidConfig(String),
}

/// Fetching account details failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("account {0} does not exist")]
    AccountNotFound(String),
    #[error("rpc request failed: {0}")]
    Rpc(String),
    #[error("malformed account data: {0}")]
    Malformed(String),
}

/// A contract read or write failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractCallError {
    #[error("method '{0}' is not declared on this binding")]
    UndeclaredMethod(String),
    #[error("no signing key for {account_id} on {network_id}")]
    MissingKey {
        account_id: String,
        network_id: String,
    },
    #[error("rpc request failed: {0}")]
    Rpc(String),
    #[error("could not decode contract response: {0}")]
    Decode(String),
    #[error("transaction failed: {0}")]
    Execution(String),
}

/// The wallet redirect did not produce a credential.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignInError {
    #[error("contract account {0} does not exist")]
    ContractNotFound(String),
    #[error("wallet rejected sign-in: {0}")]
    Rejected(String),
    #[error("timed out waiting for the wallet redirect")]
    Timeout,
    #[error("sign-in redirect failed: {0}")]
    Redirect(String),
    #[error("could not store credential: {0}")]
    Storage(String),
}

/// Errors surfaced by [`crate::SessionController`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    SignIn(#[from] SignInError),
}

/// A staged edit was refused; the staged color is unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("'{raw}' is not an integer value for channel {channel}")]
    InvalidInput { channel: Channel, raw: String },
    #[error("no color loaded to edit")]
    NotLoaded,
}
