use std::{fmt::Write as _, sync::Arc};

use {
    anyhow::{Result, bail},
    chroma_config::ChromaConfig,
    chroma_rpc::format_near_amount,
    chroma_session::{
        Channel, Rgb, SessionController, SessionStatus, SessionView, SignInOutcome,
        SubmissionState, SubmitOutcome, SubmitRejection,
    },
    chroma_wallet::{
        AuthStore, BrowserLauncher, KeyStore, NearGateway, RpcContractProxy, WalletConnection,
    },
    tracing::warn,
    url::Url,
};

pub type Session = SessionController<NearGateway, WalletConnection, RpcContractProxy>;

fn open_in_browser(url: &Url) {
    println!("Opening wallet for sign-in...");
    if open::that(url.as_str()).is_err() {
        println!("Could not open browser. Please visit:\n{url}");
    }
}

pub fn build_session(config: &ChromaConfig) -> Session {
    let launcher: BrowserLauncher = Arc::new(open_in_browser);
    let keys = KeyStore::new();
    let identity = WalletConnection::with_stores(
        config.wallet.clone(),
        keys.clone(),
        AuthStore::new(&config.wallet.app_key_prefix),
        launcher,
    );
    SessionController::new(config, NearGateway, identity, RpcContractProxy::new(keys))
}

/// Connect and hydrate. Failures are already reflected in the view, so they
/// are only logged here.
async fn initialize(session: &Session) -> SessionView {
    if let Err(e) = session.initialize().await {
        warn!(error = %e, "session not ready");
    }
    session.view().await
}

pub async fn status(session: &Session) -> Result<()> {
    let view = initialize(session).await;
    print!("{}", render_view(&view));
    Ok(())
}

pub async fn login(session: &Session) -> Result<()> {
    let view = initialize(session).await;
    if let Some(account) = &view.account {
        println!("Already signed in as {}", account.identifier);
        return Ok(());
    }
    if !view.can_sign_in() {
        bail!("cannot sign in: {}", problem(&view));
    }

    match session.sign_in().await? {
        SignInOutcome::Completed(status) => {
            println!("Sign-in complete ({}).", status_label(status));
        },
        SignInOutcome::Skipped => println!("Sign-in was not needed."),
    }
    print!("{}", render_view(&session.view().await));
    Ok(())
}

pub async fn logout(session: &Session) -> Result<()> {
    initialize(session).await;
    if session.sign_out().await {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

pub async fn get(session: &Session) -> Result<()> {
    let view = initialize(session).await;
    match view.remote {
        Some(rgb) => {
            println!("{} {rgb}", swatch(rgb));
            Ok(())
        },
        None => bail!("no color available: {}", problem(&view)),
    }
}

pub async fn set(
    session: &Session,
    r: Option<String>,
    g: Option<String>,
    b: Option<String>,
) -> Result<()> {
    let edits: Vec<(Channel, String)> = Channel::ALL
        .into_iter()
        .zip([r, g, b])
        .filter_map(|(channel, raw)| raw.map(|raw| (channel, raw)))
        .collect();
    if edits.is_empty() {
        bail!("nothing to set; pass at least one of --r, --g, --b");
    }

    let view = initialize(session).await;
    if !view.can_submit() {
        bail!("cannot write a color: {}", problem(&view));
    }
    for (channel, raw) in &edits {
        session.edit_staged(*channel, raw).await?;
    }

    match session.submit().await {
        SubmitOutcome::Submitted(rgb) => println!("Submitted {} {rgb}", swatch(rgb)),
        SubmitOutcome::Rejected(SubmitRejection::InFlight) => {
            bail!("another write is still in flight")
        },
        SubmitOutcome::Rejected(SubmitRejection::NotReady) => {
            bail!("session is not ready to write")
        },
    }
    print!("{}", render_view(&session.view().await));
    Ok(())
}

fn problem(view: &SessionView) -> String {
    view.problem
        .clone()
        .unwrap_or_else(|| status_label(view.status).to_string())
}

fn status_label(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Offline => "offline",
        SessionStatus::Unauthenticated => "not signed in",
        SessionStatus::AccountUnavailable => "account unavailable",
        SessionStatus::ContractUnreadable => "contract unreadable",
        SessionStatus::Ready => "ready",
    }
}

/// Two-cell truecolor block in the display-clamped color.
fn swatch(rgb: Rgb) -> String {
    let [r, g, b] = rgb.to_display_bytes();
    format!("\x1b[48;2;{r};{g};{b}m  \x1b[0m")
}

fn render_view(view: &SessionView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status:    {}", status_label(view.status));
    if let Some(problem) = &view.problem {
        let _ = writeln!(out, "Problem:   {problem}");
    }
    match &view.account {
        Some(account) => {
            let balance = format_near_amount(&account.balance_available, None)
                .unwrap_or_else(|_| account.balance_available.clone());
            let _ = writeln!(out, "Account:   {}", account.identifier);
            let _ = writeln!(out, "Balance:   {balance} NEAR");
        },
        None if view.can_sign_in() => {
            let _ = writeln!(out, "Account:   none (run `chroma login`)");
        },
        None => {},
    }
    if let Some(contract_id) = &view.contract_id {
        let _ = writeln!(out, "Contract:  {contract_id}");
    }
    if let Some(remote) = view.remote {
        let _ = writeln!(out, "Color:     {} {remote}", swatch(remote));
    }
    if let Some(staged) = view.staged
        && view.remote != Some(staged)
    {
        let _ = writeln!(out, "Staged:    {} {staged}", swatch(staged));
    }
    if view.submission == SubmissionState::InFlight {
        let _ = writeln!(out, "Write:     in flight");
    }
    out
}
