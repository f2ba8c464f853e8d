//! Keyword deduplication CLI
//!
//! Finds near-duplicate keywords by embedding similarity, clusters them and
//! merges each cluster into its oldest member.
//!
//! # Usage
//!
//! ```bash
//! keyword-dedupe run [--apply] [--threshold 0.8] [--aggressive] [--name-only]
//! keyword-dedupe run --input keywords.json --json
//! keyword-dedupe config
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/keyword-dedupe/config.toml, or --config)
//! 3. Environment variables (DEDUPE_*, plus OPENAI_API_KEY, SUPABASE_URL, ...)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use keyword_cli::{run_dedupe, show_config, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            run_dedupe(cli.config.as_deref(), cli.log_level.as_deref(), args).await?;
        }
        Commands::Config => {
            show_config(cli.config.as_deref(), cli.log_level.as_deref())?;
        }
    }

    Ok(())
}
