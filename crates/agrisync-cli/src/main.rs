//! AgriSync CLI - farm records that keep working without a network
//!
//! Records are saved to a local database first and queued; `agrisync sync`
//! replays the queue once the remote service is reachable, and
//! `agrisync watch` keeps doing so on every reconnect.

mod cli;
mod commands;
mod error;
mod remote;
mod settings;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{open_service, NetworkOptions};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::queue::run_queue;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;
use crate::settings::{default_config_path, resolve_settings};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("agrisync=info")),
        )
        .init();

    let cli = Cli::parse();
    let resolved = resolve_settings(&default_config_path(), cli.db_path, cli.api_url)?;
    let options = NetworkOptions {
        offline: cli.offline,
        mock: cli.mock,
    };

    match cli.command {
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Config { command } => run_config(command, &resolved)?,
        command => {
            let service = open_service(&resolved, options).await?;
            match command {
                Commands::Add { record } => run_add(&service, record).await?,
                Commands::List { collection, json } => {
                    run_list(&service, &collection, json).await?;
                }
                Commands::Delete { collection, id } => {
                    run_delete(&service, &collection, &id).await?;
                }
                Commands::Queue { json, clear } => run_queue(&service, json, clear).await?,
                Commands::Sync => run_sync(&service).await?,
                Commands::Watch => run_watch(&service, &resolved, options).await?,
                Commands::Status { json } => run_status(&service, json).await?,
                Commands::Completions { .. } | Commands::Config { .. } => {}
            }
        }
    }

    Ok(())
}
