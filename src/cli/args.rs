//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// shellcache - offline cache manager for web application shells
///
/// Stages, activates and serves a versioned application shell from a
/// persistent cache driven by a build-time resource manifest.
#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHELLCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Resource manifest (overrides manifest.path)
    #[arg(short, long, global = true, env = "SHELLCACHE_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Application origin (overrides origin.url)
    #[arg(long, global = true)]
    pub origin: Option<String>,

    /// Store root directory (overrides store.root)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage the core shell into the staging partition
    Install,

    /// Promote the staged shell into the live cache
    Activate,

    /// Install then activate
    Upgrade,

    /// Route one request through the live cache
    Fetch(FetchArgs),

    /// Send a message command to the worker
    Message(MessageArgs),

    /// Show lifecycle state and cache coverage
    Status(StatusArgs),

    /// Delete every partition
    Clear(ClearArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL or origin-relative path (e.g. /main.js)
    pub url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Write the response body to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the message command
#[derive(Parser, Debug)]
pub struct MessageArgs {
    /// Command to deliver
    #[arg(value_enum)]
    pub command: MessageCommand,
}

/// Message commands accepted by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageCommand {
    /// Supersede a running instance immediately
    SkipWaiting,
    /// Download every manifest resource for offline use
    DownloadOffline,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., origin.url)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for status
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
}
