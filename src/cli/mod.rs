//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::partner::FieldKey;
use crate::remote::Entity;

pub mod commands;

/// ERP client: partner files, batch jobs and entity workflows
#[derive(Parser, Debug)]
#[command(name = "erp", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL (default: http://localhost:8000/api)
    #[arg(long, global = true, env = "ERP_API_URL")]
    pub api_url: Option<String>,

    /// API bearer token
    #[arg(long, global = true, env = "ERP_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information
    Version,

    /// Import and export `.partner` files
    Partner {
        #[command(subcommand)]
        command: PartnerCommands,
    },

    /// Server-side export jobs
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },

    /// Server-side import jobs
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },

    /// Business entities (orders, delivery notes, promotions...)
    Entity {
        #[command(subcommand)]
        command: EntityCommands,
    },

    /// Client configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Partner Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum PartnerCommands {
    /// Parse a `.partner` file and report fields, errors and warnings
    Parse {
        /// Path to the `.partner` file
        file: PathBuf,
    },

    /// Compare a `.partner` file with a live partner
    Diff(PartnerFileArgs),

    /// Apply selected fields of a `.partner` file to a live partner
    Apply(ApplyArgs),

    /// Export a live partner to a `.partner` file
    Export {
        /// Partner ID
        #[arg(long)]
        id: String,

        /// Output file (default: partner-<id>.partner)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print to stdout instead of writing a file
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },
}

#[derive(Args, Debug)]
pub struct PartnerFileArgs {
    /// Path to the `.partner` file
    pub file: PathBuf,

    /// Partner ID
    #[arg(long)]
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: PartnerFileArgs,

    /// Apply only these fields (`key` or `key@line`, repeatable)
    #[arg(long = "only", value_name = "KEY")]
    pub only: Vec<FieldKey>,

    /// Leave these fields out of the default selection (repeatable)
    #[arg(long = "exclude", value_name = "KEY", conflicts_with = "only")]
    pub exclude: Vec<FieldKey>,

    /// Show what would be sent without updating the partner
    #[arg(long)]
    pub dry_run: bool,
}

// ============================================================================
// Job Commands
// ============================================================================

#[derive(Args, Debug, Clone, Copy)]
pub struct WaitArgs {
    /// Poll until the job finishes
    #[arg(long)]
    pub wait: bool,

    /// Poll interval in milliseconds (default: config or 2000)
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum ExportCommands {
    /// Start an export job
    Start {
        /// Entity to export
        entity: Entity,

        /// File format understood by the backend
        #[arg(long, default_value = "xlsx")]
        format: String,

        /// Export filter (`key=value`, repeatable)
        #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,

        /// Download the file here once the job finishes (implies --wait)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Show an export job's status
    Status {
        /// Job ID
        id: String,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Download a finished export
    Download {
        /// Job ID
        id: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImportCommands {
    /// Upload a file and start an import job
    Run {
        /// File to import
        file: PathBuf,

        /// Entity the file contains
        #[arg(long)]
        entity: Entity,

        /// Return right after the job starts
        #[arg(long)]
        no_wait: bool,

        /// Poll interval in milliseconds (default: config or 2000)
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
    },

    /// Show an import job's status
    Status {
        /// Job ID
        id: String,

        #[command(flatten)]
        wait: WaitArgs,
    },
}

// ============================================================================
// Entity Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum EntityCommands {
    /// List an entity collection
    List {
        /// Entity collection
        entity: Entity,

        /// Query filter (`key=value`, repeatable)
        #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,

        /// Page number
        #[arg(long)]
        page: Option<u32>,
    },

    /// Show one entity
    Show {
        /// Entity collection
        entity: Entity,

        /// Entity ID
        id: String,
    },

    /// Run a workflow action (validate, cancel, ship...)
    Transition {
        /// Entity collection
        entity: Entity,

        /// Entity ID
        id: String,

        /// Action name
        action: String,

        /// JSON body sent with the action
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved settings and where they come from
    Show,

    /// Store settings in the config file
    Set {
        /// API base URL
        #[arg(long)]
        api_url: Option<String>,

        /// API bearer token
        #[arg(long)]
        token: Option<String>,

        /// Job poll interval in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// Parse `key=value`.
fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
