//! keyword-dedupe command-line library.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, config)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, RunArgs, StoreArg};
pub use commands::{apply_run_overrides, load_settings, render_summary, run_dedupe, show_config};
