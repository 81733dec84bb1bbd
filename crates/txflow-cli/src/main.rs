//! txflow CLI

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use txflow::FlowRegistry;
use txflow_redb::RedbKVStore;

mod config;
mod sub_commands;

const DEFAULT_WORK_DIR: &str = ".txflow-cli";

/// Simple CLI application to inspect persisted transaction flows
#[derive(Parser)]
#[command(name = "txflow-cli")]
#[command(author = "txflow Developers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to working dir
    #[arg(short, long)]
    work_dir: Option<PathBuf>,
    /// Settings file, defaults to config.toml in the working dir
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Logging level
    #[arg(short, long, default_value = "error")]
    log_level: Level,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List users with stored flows
    Users,
    /// List the flows of a user
    List(sub_commands::list::ListSubCommand),
    /// Print a flow as json
    Show(sub_commands::show::ShowSubCommand),
    /// List the registries stored in the configured namespace
    Keys,
    /// Remove one or all flows of a user
    Clear(sub_commands::clear::ClearSubCommand),
    /// Set the bridge status of a transaction
    BridgeStatus(sub_commands::bridge_status::BridgeStatusSubCommand),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Cli = Cli::parse();
    let default_filter = args.log_level;

    let env_filter = EnvFilter::new(format!("{default_filter},redb=warn"));

    // Parse input
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let work_dir = match &args.work_dir {
        Some(work_dir) => work_dir.clone(),
        None => {
            let home_dir =
                home::home_dir().ok_or_else(|| anyhow!("Could not locate home directory"))?;
            home_dir.join(DEFAULT_WORK_DIR)
        }
    };

    fs::create_dir_all(&work_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| work_dir.join(config::DEFAULT_CONFIG_FILE));
    let settings = config::Settings::new(&config_path)?;

    let redb_path = work_dir.join(&settings.database.file_name);
    let localstore = Arc::new(RedbKVStore::new(&redb_path)?);

    let registry = FlowRegistry::restore(localstore.clone(), &settings.store).await?;

    match &args.command {
        Commands::Keys => {
            sub_commands::keys::keys(localstore.as_ref(), &settings.store.storage).await
        }
        Commands::Users => sub_commands::users::users(&registry),
        Commands::List(sub_command_args) => sub_commands::list::list(&registry, sub_command_args),
        Commands::Show(sub_command_args) => sub_commands::show::show(&registry, sub_command_args),
        Commands::Clear(sub_command_args) => {
            sub_commands::clear::clear(&registry, sub_command_args).await
        }
        Commands::BridgeStatus(sub_command_args) => {
            sub_commands::bridge_status::bridge_status(&registry, sub_command_args).await
        }
    }
}
