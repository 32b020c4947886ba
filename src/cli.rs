//! CLI definitions for Restock.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use restock_protocols::{ProviderId, SelectionMode};

/// Restock CLI.
#[derive(Parser)]
#[command(name = "restock")]
#[command(about = "Automated grocery restocking from fridge detections")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/restock.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Open a storefront in a visible browser and capture the login session
    Login {
        /// Storefront to log in to (getir, migros, akbal)
        provider: ProviderId,
    },

    /// Resolve missing items and add them to a storefront cart
    Order {
        /// Items to order as KEY or KEY=QTY (e.g. milk=2); empty resolves
        /// from the baseline
        #[arg(conflicts_with_all = ["baseline", "from_history"])]
        items: Vec<String>,

        /// Storefront override (defaults to the stored preference)
        #[arg(long)]
        provider: Option<ProviderId>,

        /// Resolve deficits from the configured baseline and the latest
        /// snapshot (the default when no items are given)
        #[arg(long, conflicts_with = "from_history")]
        baseline: bool,

        /// Resolve deficits from detection history instead of the baseline
        #[arg(long)]
        from_history: bool,

        /// Print the resolved order without opening a browser
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask the model which items look depleted based on history
    Suggest,

    /// Detection snapshot commands
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show or change stored preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Cart operations on a storefront
    Cart {
        /// Storefront (defaults to the stored preference)
        #[arg(long)]
        provider: Option<ProviderId>,

        /// Empty the cart first
        #[arg(long)]
        clear: bool,

        /// Leave the browser open on the cart page
        #[arg(long)]
        open: bool,
    },
}

#[derive(Subcommand)]
pub(crate) enum HistoryAction {
    /// List recent snapshots
    List {
        /// How many snapshots to show
        #[arg(long, default_value_t = 10)]
        limit: u32,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Save a detection snapshot (KEY=COUNT pairs, bare KEY counts as 1)
    Save {
        /// Items detected, e.g. milk=2 eggs=6
        #[arg(required_unless_present = "detections", conflicts_with = "detections")]
        items: Vec<String>,

        /// Read detector output (a JSON array of detections) from a file
        /// instead; detections below the preference threshold are dropped
        #[arg(long, value_name = "PATH")]
        detections: Option<PathBuf>,

        /// Snapshot date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete one snapshot by id
    Delete {
        /// Snapshot id as shown by `history list`
        id: i64,
    },

    /// Delete every snapshot
    Clear,
}

#[derive(Subcommand)]
pub(crate) enum PrefsAction {
    /// Print the stored preference record
    Show,

    /// Update one or more preference fields
    Set {
        /// Free-text guidance for product selection
        #[arg(long)]
        instructions: Option<String>,

        /// Default storefront (getir, migros, akbal)
        #[arg(long)]
        provider: Option<ProviderId>,

        /// Minimum detection confidence (0.0 - 1.0)
        #[arg(long)]
        threshold: Option<f32>,

        /// Selection mode (cheapest, best_value, premium)
        #[arg(long)]
        mode: Option<SelectionMode>,
    },
}
