//! Command-line client for civtech.
//!
//! Connects an identity to the record store and runs one operation:
//! list the directory, show the tech tree, create a civilization, research
//! a technology, or reveal an attribute.
//!
//! # Architecture
//!
//! ```text
//! civtech-config.yaml + env --> ClientConfig --> Session --> Lifecycle
//!                                                   |
//!                                                   +--> Dragonfly / memory
//! ```
//!
//! The identity key is read from `CIVTECH_IDENTITY_KEY` (64 hex chars).
//! Without it a throwaway identity is generated for the run.

mod commands;

use std::path::PathBuf;

use anyhow::Context as _;
use civtech_core::{Attribute, ClientConfig, LocalLifecycle, Session, SessionParams, open_store};
use civtech_crypto::{CancelToken, LocalSigner};
use civtech_types::CivilizationId;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the identity's signing seed.
const IDENTITY_KEY_VAR: &str = "CIVTECH_IDENTITY_KEY";

/// Manage civilizations and their technology research.
#[derive(Debug, Parser)]
#[command(name = "civtech", version)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "civtech-config.yaml")]
    config: PathBuf,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and list every civilization.
    Sync,
    /// Show the tech tree and your research progress.
    Tree,
    /// Create a civilization owned by your identity.
    Create {
        /// Civilization name.
        #[arg(long)]
        name: String,
        /// Starting research points.
        #[arg(long, default_value = "0")]
        points: Decimal,
        /// Starting military power.
        #[arg(long, default_value = "0")]
        power: Decimal,
    },
    /// Research a technology for one of your civilizations.
    Research {
        /// Civilization id, as listed by `sync`.
        civ: CivilizationId,
        /// Technology id, e.g. `metallurgy`.
        tech: String,
    },
    /// Reveal an encrypted attribute of one of your civilizations.
    Reveal {
        /// Civilization id, as listed by `sync`.
        civ: CivilizationId,
        /// Which attribute to reveal.
        #[arg(value_enum)]
        attribute: AttributeArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AttributeArg {
    /// Research points.
    Points,
    /// Military power.
    Power,
}

impl From<AttributeArg> for Attribute {
    fn from(arg: AttributeArg) -> Self {
        match arg {
            AttributeArg::Points => Self::ResearchPoints,
            AttributeArg::Power => Self::MilitaryPower,
        }
    }
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, connection, or the requested
/// operation fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        ClientConfig::from_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        ClientConfig::parse("")?
    };

    init_logging(&config.logging.level, cli.json_logs);
    info!(
        config = %cli.config.display(),
        store_backend = ?config.store.backend,
        chain_id = config.auth.chain_id,
        "civtech starting"
    );

    let signer = load_identity()?;
    let store = open_store(&config.store).await?;
    let session = Session::connect(signer, SessionParams::from_config(&config), store)?;
    let lifecycle = LocalLifecycle::local(&config.auth);

    let cancel = CancelToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    let report = session.sync().await?;
    commands::print_load_report(&report);

    let outcome = match cli.command {
        Command::Sync => {
            let directory = session.directory().await;
            commands::report_order_violations(&lifecycle, &directory);
            print!("{}", commands::render_directory(&directory));
            Ok(())
        }
        Command::Tree => {
            let directory = session.directory().await;
            print!("{}", commands::render_tree(lifecycle.tree(), directory.player()));
            Ok(())
        }
        Command::Create {
            name,
            points,
            power,
        } => commands::create(&lifecycle, &session, &name, points, power).await,
        Command::Research { civ, tech } => {
            commands::research(&lifecycle, &session, &civ, &tech, &cancel).await
        }
        Command::Reveal { civ, attribute } => {
            commands::reveal(&lifecycle, &session, &civ, attribute.into(), &cancel).await
        }
    };

    session.disconnect().await;
    outcome
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load the identity from the environment, or generate one.
fn load_identity() -> anyhow::Result<LocalSigner> {
    match std::env::var(IDENTITY_KEY_VAR) {
        Ok(seed) => LocalSigner::from_hex_seed(&seed)
            .with_context(|| format!("{IDENTITY_KEY_VAR} is not a valid key")),
        Err(_) => {
            let signer = LocalSigner::generate();
            warn!(
                identity = %signer.address_unchecked(),
                "{IDENTITY_KEY_VAR} not set, using a throwaway identity"
            );
            Ok(signer)
        }
    }
}
