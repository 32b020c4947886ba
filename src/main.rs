//! Restock - automated grocery restocking.
//!
//! Main entry point for the restock CLI.

use std::path::PathBuf;

use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod cmd_cart;
mod cmd_history;
mod cmd_login;
mod cmd_order;
mod cmd_prefs;
mod cmd_suggest;
mod config;
mod factory;

use crate::cli::{Cli, Commands};
use crate::config::Config;

/// Get the .restock directory path.
fn restock_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".restock"))
        .unwrap_or_else(|| PathBuf::from(".restock"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.restock/debug/ with daily rotation.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = restock_dir().join("debug");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("restock")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    // Keep the flush guard alive for the program duration.
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        // Console layer (human-readable, with colors)
        .with(fmt::layer().with_target(true).with_ansi(true))
        // File layer (no colors)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Login { provider } => cmd_login::handle_login(provider, &config).await,
        Commands::Order {
            items,
            provider,
            baseline,
            from_history,
            dry_run,
        } => {
            cmd_order::handle_order(items, provider, baseline, from_history, dry_run, &config)
                .await
        }
        Commands::Suggest => cmd_suggest::handle_suggest(&config).await,
        Commands::History { action } => {
            cmd_history::handle_history_command(action, &config).await
        }
        Commands::Prefs { action } => cmd_prefs::handle_prefs_command(action, &config).await,
        Commands::Cart {
            provider,
            clear,
            open,
        } => cmd_cart::handle_cart(provider, clear, open, &config).await,
    }
}
