//! Session core of the chroma client.
//!
//! [`SessionController`] drives a connection, an identity provider and a
//! contract proxy through connect → authenticate → bind → hydrate, keeps a
//! staged copy of the contract's color for editing, and submits it with at
//! most one write in flight.

pub mod color;
pub mod controller;
pub mod error;
pub mod provider;

pub use {
    color::{Channel, Rgb},
    controller::{
        SessionController, SessionStatus, SessionView, SignInOutcome, SubmissionState,
        SubmitOutcome, SubmitRejection,
    },
    error::{ConnectError, ContractCallError, EditError, NetworkError, SessionError, SignInError},
    provider::{
        Account, ContractBinding, ContractMethods, ContractProxy, IdentityProvider,
        NetworkGateway, SignInRequest,
    },
};
