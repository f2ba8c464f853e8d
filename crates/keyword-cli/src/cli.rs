//! CLI argument parsing for keyword-dedupe.
//!
//! CLI flags override every other config source.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Keyword deduplication
///
/// Finds near-duplicate keywords by embedding similarity and merges them.
#[derive(Parser, Debug)]
#[command(name = "keyword-dedupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/keyword-dedupe/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find duplicate keywords and, with --apply, merge them
    Run(RunArgs),

    /// Print the effective configuration as TOML (secrets redacted)
    Config,
}

/// Options of the `run` command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Apply merges (default is a dry run that only reports)
    #[arg(long)]
    pub apply: bool,

    /// Minimum similarity for a candidate pair (0.0-1.0)
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Maximum accepted pairs per keyword
    #[arg(long)]
    pub max_neighbors: Option<usize>,

    /// Delete every secondary without asking the decider
    #[arg(long)]
    pub aggressive: bool,

    /// Compare name embeddings only
    #[arg(long)]
    pub name_only: bool,

    /// Maximum keywords to fetch
    #[arg(long)]
    pub limit: Option<usize>,

    /// Drop clusters larger than this
    #[arg(long)]
    pub max_cluster_size: Option<usize>,

    /// Keep merged secondaries instead of deleting them
    #[arg(long)]
    pub keep_secondaries: bool,

    /// Keyword store backend
    #[arg(long, value_enum)]
    pub store: Option<StoreArg>,

    /// JSON file for the json backend (implies --store json)
    #[arg(long)]
    pub input: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Store backends selectable from the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreArg {
    Supabase,
    Json,
}
