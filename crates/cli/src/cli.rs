use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Operator tooling for tidewatch pipelines.
///
/// Checks pipeline files and previews the scheduler entries they produce
/// without touching a live scheduler.
#[derive(Parser, Debug)]
#[command(name = "tidewatch", about = "Operator tooling for tidewatch pipelines")]
pub struct CliArgs {
    /// Settings TOML file (environment variables still override it)
    #[arg(long, global = true, env = "TIDEWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate every pipeline in a file
    Validate {
        /// Pipelines file (default: the configured pipelines file)
        file: Option<PathBuf>,
    },

    /// Show the scheduler entries a pipelines file produces
    Plan {
        file: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List scheduler entries whose cron tick is due
    Due {
        file: Option<PathBuf>,

        /// Instant to check, RFC 3339 (default: now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Print the resolved engine settings
    Settings,
}
