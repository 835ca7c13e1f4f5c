mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;

use tidewatch_core::config::load_dotenv;
use tidewatch_core::EngineSettings;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let settings = match &args.config {
        Some(path) => EngineSettings::from_file(path)
            .with_context(|| format!("failed to load settings: {}", path.display()))?,
        None => EngineSettings::from_env(),
    };
    settings.log_summary();

    let pipelines_file = |file: Option<std::path::PathBuf>| {
        file.unwrap_or_else(|| settings.pipelines_file.clone())
    };

    match args.command {
        Command::Validate { file } => commands::validate(&pipelines_file(file)),
        Command::Plan { file, json } => commands::plan(&pipelines_file(file), json).await,
        Command::Due { file, at } => commands::due(&pipelines_file(file), at.as_deref()).await,
        Command::Settings => commands::settings(&settings),
    }
}
