//! VaultView CLI - encrypted vault browsing service.
//!
//! Runs the HTTP service, or performs one-shot vault operations for
//! troubleshooting a deployment.

use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vaultview_adapter::cli::PASSPHRASE_ENV;
use vaultview_common::{Passphrase, VaultPath};
use vaultview_server::{AppConfig, AppState};

#[derive(Parser)]
#[command(name = "vaultview")]
#[command(about = "VaultView - browse encrypted vaults over HTTP")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve {
        /// Address to listen on.
        #[arg(short, long, default_value = "0.0.0.0:8000")]
        listen: SocketAddr,
    },

    /// Mount a vault once and list a directory.
    List {
        /// Path to the vault container.
        #[arg(short = 'p', long)]
        vault_path: PathBuf,

        /// Directory within the vault (default: root).
        #[arg(short, long, default_value = "/")]
        dir: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve { listen } => {
            let config = AppConfig::from_env().context("loading configuration")?;
            if config.vaults.is_empty() {
                warn!("no vaults configured; logins will fail");
            }
            info!(vaults = config.vaults.len(), listen = %listen, "starting vaultview");
            let state = AppState::new(config);
            vaultview_server::serve(state, listen)
                .await
                .context("server error")?;
        }

        Commands::List { vault_path, dir } => {
            let config = AppConfig::from_env().context("loading configuration")?;
            let state = AppState::new(config);
            let passphrase = read_passphrase()?;

            let adapter = state.adapter_for(&vault_path);
            let path = VaultPath::parse(&dir)?;
            let mounted = adapter.open(&passphrase).await?;
            let entries = mounted.list_dir(&path).await?;
            drop(mounted);

            for entry in entries {
                match entry.size {
                    Some(size) => println!("{:>12}  {}", size, entry.name),
                    None => println!("{:>12}  {}/", "-", entry.name),
                }
            }
        }
    }

    Ok(())
}

/// Read the passphrase from the environment, or prompt for it.
fn read_passphrase() -> Result<Passphrase> {
    if let Ok(secret) = std::env::var(PASSPHRASE_ENV) {
        return Ok(Passphrase::new(secret));
    }
    eprint!("Passphrase: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading passphrase")?;
    Ok(Passphrase::new(line.trim_end_matches(['\r', '\n'])))
}
