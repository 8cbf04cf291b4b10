//! CLI interface for gexflow
//!
//! Provides subcommands for:
//! - `run`: process signal payloads through the decision pipeline
//! - `config`: show the effective configuration
//! - `status`: show current state

mod run;

pub use run::{build_pipeline, RunArgs};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gexflow")]
#[command(about = "Options signal decision engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process signal payloads (JSON lines from a file or stdin)
    Run(RunArgs),
    /// Show the effective configuration
    Config,
    /// Show current state
    Status,
}
