//! JSON-RPC access to a NEAR-style ledger: typed queries, ed25519 access keys,
//! borsh-encoded function-call transactions and yocto amount formatting.

pub mod client;
pub mod keys;
pub mod transaction;
pub mod types;
pub mod units;

pub use {
    client::RpcClient,
    keys::{KeyPair, PublicKey},
    transaction::{DEFAULT_FUNCTION_CALL_GAS, FunctionCall, SignedTransaction, Transaction},
    types::{AccessKeyView, AccountView, CallResult, NodeStatus, RpcError},
    units::{available_balance, format_near_amount},
};
