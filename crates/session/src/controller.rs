//! The session controller: connect, authenticate, bind, hydrate, edit, submit.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use {
    chroma_config::{ChromaConfig, ContractConfig, NetworkConfig},
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

use crate::{
    color::{Channel, Rgb, parse_channel_input},
    error::{EditError, SessionError},
    provider::{
        Account, ContractBinding, ContractMethods, ContractProxy, IdentityProvider,
        NetworkGateway, SignInRequest,
    },
};

// ── Public view ──────────────────────────────────────────────────────────────

/// Coarse session state as the UI sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not connected yet, or the network could not be reached.
    Offline,
    /// Connected, no local credential. Only sign-in is meaningful.
    Unauthenticated,
    /// A credential exists but the account could not be fetched.
    AccountUnavailable,
    /// Authenticated and bound, but the current color could not be read.
    ContractUnreadable,
    /// Authenticated, bound and hydrated.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    InFlight,
}

/// Snapshot of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub status: SessionStatus,
    pub account: Option<Account>,
    pub contract_id: Option<String>,
    pub remote: Option<Rgb>,
    pub staged: Option<Rgb>,
    pub submission: SubmissionState,
    /// Why the session is not `Ready`, when known.
    pub problem: Option<String>,
}

impl SessionView {
    pub fn can_submit(&self) -> bool {
        self.status == SessionStatus::Ready && self.submission == SubmissionState::Idle
    }

    pub fn can_sign_in(&self) -> bool {
        self.status == SessionStatus::Unauthenticated
    }

    pub fn can_sign_out(&self) -> bool {
        self.account.is_some() || self.status == SessionStatus::AccountUnavailable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInOutcome {
    /// Not in the unauthenticated state; nothing happened.
    Skipped,
    /// The redirect completed and the session was re-initialized.
    Completed(SessionStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    /// Another write is outstanding.
    InFlight,
    /// No hydrated binding to write through.
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The write ran to completion (successfully or not) and `remote` now
    /// holds this payload.
    Submitted(Rgb),
    Rejected(SubmitRejection),
}

// ── Internal state ───────────────────────────────────────────────────────────

enum Colors {
    Loaded { remote: Rgb, staged: Rgb },
    Unreadable { reason: String },
}

struct Authenticated<B> {
    account: Account,
    binding: Arc<B>,
    colors: Colors,
}

enum State<C, B> {
    Offline {
        reason: Option<String>,
    },
    Unauthenticated {
        connection: Arc<C>,
    },
    AccountUnavailable {
        connection: Arc<C>,
        account_id: String,
        reason: String,
    },
    Authenticated {
        connection: Arc<C>,
        session: Authenticated<B>,
    },
}

/// Resets the in-flight flag even if the submitting future is dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Controller ───────────────────────────────────────────────────────────────

/// Orchestrates the session against its three collaborators.
///
/// Every operation takes `&self`: the state sits behind an async lock that is
/// never held across a remote call, so the submission flag and the view stay
/// observable while a write is outstanding.
pub struct SessionController<G, I, P>
where
    G: NetworkGateway,
    I: IdentityProvider<Connection = G::Connection>,
    P: ContractProxy<Connection = G::Connection>,
{
    network: NetworkConfig,
    contract: ContractConfig,
    gateway: G,
    identity: I,
    proxy: P,
    state: RwLock<State<G::Connection, P::Binding>>,
    in_flight: AtomicBool,
}

impl<G, I, P> SessionController<G, I, P>
where
    G: NetworkGateway,
    I: IdentityProvider<Connection = G::Connection>,
    P: ContractProxy<Connection = G::Connection>,
{
    pub fn new(config: &ChromaConfig, gateway: G, identity: I, proxy: P) -> Self {
        Self {
            network: config.network.clone(),
            contract: config.contract.clone(),
            gateway,
            identity,
            proxy,
            state: RwLock::new(State::Offline { reason: None }),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Build the session from zero: connect, resolve the credential, bind and
    /// read the current color.
    ///
    /// Safe to call repeatedly; it is also how the session recovers after the
    /// sign-in redirect.
    pub async fn initialize(&self) -> Result<SessionStatus, SessionError> {
        *self.state.write().await = State::Offline { reason: None };

        let connection = match self.gateway.connect(&self.network).await {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                warn!(node_url = %self.network.node_url, error = %e, "failed to connect");
                *self.state.write().await = State::Offline {
                    reason: Some(e.to_string()),
                };
                return Err(e.into());
            },
        };
        debug!(network = %self.network.network_id, "connected");

        let Some(account_id) = self.identity.current_account_id(&connection) else {
            info!("no local credential, signed out");
            *self.state.write().await = State::Unauthenticated { connection };
            return Ok(SessionStatus::Unauthenticated);
        };

        let account = match self.identity.get_account(&connection, &account_id).await {
            Ok(account) => account,
            Err(e) => {
                warn!(account = %account_id, error = %e, "failed to fetch account");
                *self.state.write().await = State::AccountUnavailable {
                    connection,
                    account_id,
                    reason: e.to_string(),
                };
                return Err(e.into());
            },
        };

        let binding = Arc::new(self.proxy.bind(
            &connection,
            &account,
            &self.contract.contract_id,
            ContractMethods::new(
                self.contract.view_methods.iter().cloned(),
                self.contract.change_methods.iter().cloned(),
            ),
        ));

        let colors = match binding.call(&self.contract.read_method).await {
            Ok(rgb) => Colors::Loaded {
                remote: rgb,
                staged: rgb,
            },
            Err(e) => {
                warn!(
                    contract = %self.contract.contract_id,
                    method = %self.contract.read_method,
                    error = %e,
                    "failed to read contract state"
                );
                Colors::Unreadable {
                    reason: e.to_string(),
                }
            },
        };
        let status = match colors {
            Colors::Loaded { remote, .. } => {
                info!(account = %account.identifier, color = %remote, "session ready");
                SessionStatus::Ready
            },
            Colors::Unreadable { .. } => SessionStatus::ContractUnreadable,
        };

        *self.state.write().await = State::Authenticated {
            connection,
            session: Authenticated {
                account,
                binding,
                colors,
            },
        };
        Ok(status)
    }

    /// Start the wallet redirect. A no-op unless unauthenticated.
    pub async fn sign_in(&self) -> Result<SignInOutcome, SessionError> {
        let connection = match &*self.state.read().await {
            State::Unauthenticated { connection } => Arc::clone(connection),
            _ => {
                debug!("sign-in ignored, session is not unauthenticated");
                return Ok(SignInOutcome::Skipped);
            },
        };

        let request = SignInRequest {
            contract_id: self.contract.contract_id.clone(),
            method_names: self.contract.change_methods.clone(),
        };
        info!(contract = %request.contract_id, "requesting wallet sign-in");
        self.identity.sign_in(&connection, request).await?;

        // Nothing held in memory survives the redirect.
        drop(connection);
        let status = self.initialize().await?;
        Ok(SignInOutcome::Completed(status))
    }

    /// Revoke the local credential and drop account, binding and colors.
    ///
    /// Also works when the credential's account could not be fetched, so a
    /// stale credential can always be discarded. Returns `false` when no
    /// credential was present.
    pub async fn sign_out(&self) -> bool {
        let connection = match &*self.state.read().await {
            State::Authenticated { connection, .. }
            | State::AccountUnavailable { connection, .. } => Arc::clone(connection),
            _ => return false,
        };

        self.identity.sign_out(&connection).await;
        *self.state.write().await = State::Unauthenticated { connection };
        info!("signed out");
        true
    }

    /// Stage a new value for one channel from raw input-field text.
    ///
    /// Integers are stored as given, with no range check. Anything else leaves
    /// the staged color untouched.
    pub async fn edit_staged(&self, channel: Channel, raw: &str) -> Result<Rgb, EditError> {
        let value = parse_channel_input(raw).ok_or_else(|| EditError::InvalidInput {
            channel,
            raw: raw.to_string(),
        })?;

        let mut state = self.state.write().await;
        match &mut *state {
            State::Authenticated {
                session:
                    Authenticated {
                        colors: Colors::Loaded { staged, .. },
                        ..
                    },
                ..
            } => {
                *staged = staged.with(channel, value);
                debug!(%channel, value, staged = %staged, "staged color edited");
                Ok(*staged)
            },
            _ => Err(EditError::NotLoaded),
        }
    }

    /// Write the staged color through the binding.
    ///
    /// At most one write is outstanding; concurrent calls are rejected at
    /// entry. Whatever the write's outcome, `remote` becomes the submitted
    /// value and the state returns to idle. Write errors are logged only.
    pub async fn submit(&self) -> SubmitOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("submit ignored, a write is already in flight");
            return SubmitOutcome::Rejected(SubmitRejection::InFlight);
        }
        let guard = InFlightGuard(&self.in_flight);

        let prepared = match &*self.state.read().await {
            State::Authenticated {
                session:
                    Authenticated {
                        binding,
                        colors: Colors::Loaded { staged, .. },
                        ..
                    },
                ..
            } => Some((Arc::clone(binding), *staged)),
            _ => None,
        };
        let Some((binding, payload)) = prepared else {
            debug!("submit ignored, no hydrated binding");
            return SubmitOutcome::Rejected(SubmitRejection::NotReady);
        };

        info!(contract = %binding.contract_id(), color = %payload, "submitting color");
        let result = binding
            .invoke(&self.contract.write_method, payload)
            .await;

        {
            let mut state = self.state.write().await;
            if let State::Authenticated { session, .. } = &mut *state
                && Arc::ptr_eq(&session.binding, &binding)
                && let Colors::Loaded { remote, .. } = &mut session.colors
            {
                *remote = payload;
            }
        }
        drop(guard);

        match result {
            Ok(()) => info!(color = %payload, "color written"),
            // TODO: surface failed writes once the UI has an error slot; the
            // remote copy is committed regardless.
            Err(e) => warn!(color = %payload, error = %e, "color write failed"),
        }
        SubmitOutcome::Submitted(payload)
    }

    pub fn submission(&self) -> SubmissionState {
        if self.in_flight.load(Ordering::Acquire) {
            SubmissionState::InFlight
        } else {
            SubmissionState::Idle
        }
    }

    pub async fn view(&self) -> SessionView {
        let submission = self.submission();
        let state = self.state.read().await;
        let mut view = SessionView {
            status: SessionStatus::Offline,
            account: None,
            contract_id: None,
            remote: None,
            staged: None,
            submission,
            problem: None,
        };

        match &*state {
            State::Offline { reason } => view.problem = reason.clone(),
            State::Unauthenticated { .. } => view.status = SessionStatus::Unauthenticated,
            State::AccountUnavailable {
                account_id, reason, ..
            } => {
                view.status = SessionStatus::AccountUnavailable;
                view.problem = Some(format!("{account_id}: {reason}"));
            },
            State::Authenticated { session, .. } => {
                view.account = Some(session.account.clone());
                view.contract_id = Some(session.binding.contract_id().to_string());
                match &session.colors {
                    Colors::Loaded { remote, staged } => {
                        view.status = SessionStatus::Ready;
                        view.remote = Some(*remote);
                        view.staged = Some(*staged);
                    },
                    Colors::Unreadable { reason } => {
                        view.status = SessionStatus::ContractUnreadable;
                        view.problem = Some(reason.clone());
                    },
                }
            },
        }
        view
    }
}
