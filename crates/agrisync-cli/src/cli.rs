use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "agrisync")]
#[command(about = "Keep farm records offline and sync them when the network returns")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Remote service base URL (overrides config and AGRISYNC_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Treat the network as unavailable; changes are only queued
    #[arg(long, global = true)]
    pub offline: bool,

    /// Use an in-process mock server instead of the remote service
    #[arg(long, global = true, conflicts_with = "api_url")]
    pub mock: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update a farm record
    #[command(alias = "new")]
    Add {
        #[command(subcommand)]
        record: AddCommands,
    },
    /// List records from the local store
    List {
        /// Collection to show (crops, livestock, activities, transactions, market-prices, weather)
        collection: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a record locally (not sent to the server)
    Delete {
        /// Collection the record belongs to
        collection: String,
        /// Record id
        id: String,
    },
    /// Show changes waiting to be sent
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Discard every queued change without sending it
        #[arg(long, conflicts_with = "json")]
        clear: bool,
    },
    /// Send queued changes to the remote service now
    Sync,
    /// Stay running and sync whenever the server becomes reachable
    Watch,
    /// Show connectivity and sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change persistent settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum AddCommands {
    /// Record a planted crop
    Crop(CropArgs),
    /// Record a livestock group
    Livestock(LivestockArgs),
    /// Record a farm activity
    Activity(ActivityArgs),
    /// Record a money movement
    Transaction(TransactionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CropArgs {
    /// Existing crop id to update
    #[arg(long)]
    pub id: Option<i64>,
    #[arg(long)]
    pub name: String,
    /// Area in acres
    #[arg(long)]
    pub area: f64,
    /// Planting date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub plant_date: String,
    #[arg(long, default_value = "Growing")]
    pub status: String,
    /// Health score from 0 to 100
    #[arg(long, default_value_t = 100)]
    pub health: u32,
}

#[derive(Args, Debug, Clone)]
pub struct LivestockArgs {
    #[arg(long)]
    pub id: Option<i64>,
    /// Animal type, e.g. "Dairy Cows"
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: String,
    #[arg(long)]
    pub count: u32,
    /// Last veterinary checkup (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", default_value = "")]
    pub last_checkup: String,
    #[arg(long, default_value = "Good")]
    pub health: String,
}

#[derive(Args, Debug, Clone)]
pub struct ActivityArgs {
    #[arg(long)]
    pub id: Option<i64>,
    /// Activity date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub date: String,
    /// What was done
    #[arg(long)]
    pub description: String,
    #[arg(long)]
    pub cost: Option<f64>,
    #[arg(long)]
    pub income: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct TransactionArgs {
    #[arg(long)]
    pub id: Option<i64>,
    /// credit or debit
    #[arg(long = "type", value_name = "TYPE")]
    pub kind: String,
    #[arg(long)]
    pub amount: f64,
    #[arg(long)]
    pub description: String,
    /// Transaction date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub date: String,
    /// Payment method, e.g. M-Pesa
    #[arg(long)]
    pub method: Option<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update persisted settings
    Set {
        /// Remote service base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Local database file
        #[arg(long, value_name = "PATH")]
        db_file: Option<PathBuf>,
        /// clear-all or retain-failed
        #[arg(long, value_name = "POLICY")]
        clear_policy: Option<String>,
        /// Per-request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
        /// Report the connection as data-saving
        #[arg(long)]
        save_data: Option<bool>,
    },
}
