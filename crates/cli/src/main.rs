mod session_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    chroma_config::ChromaConfig,
    clap::{Parser, Subcommand},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "chroma", about = "Read and paint the color stored on a NEAR contract")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of discovering one.
    #[arg(long, global = true, env = "CHROMA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show account, balance and the current color.
    Status,
    /// Sign in through the web wallet.
    Login,
    /// Forget the signed-in account.
    Logout,
    /// Print the color stored on the contract.
    Get,
    /// Change one or more channels and write the color.
    Set {
        #[arg(long, allow_hyphen_values = true)]
        r: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        g: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        b: Option<String>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ChromaConfig> {
    let config = match &cli.config {
        Some(path) => chroma_config::load_config(path)?,
        None => chroma_config::discover_and_load(),
    };
    config.validate().context("invalid configuration")?;
    debug!(
        network = %config.network.network_id,
        contract = %config.contract.contract_id,
        "configuration loaded"
    );
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chroma starting");
    let config = load_config(&cli)?;
    let session = session_commands::build_session(&config);

    match cli.command {
        Commands::Status => session_commands::status(&session).await,
        Commands::Login => session_commands::login(&session).await,
        Commands::Logout => session_commands::logout(&session).await,
        Commands::Get => session_commands::get(&session).await,
        Commands::Set { r, g, b } => session_commands::set(&session, r, g, b).await,
    }
}
