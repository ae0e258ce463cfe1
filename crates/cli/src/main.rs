use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod commands;
mod config;
mod output;

use commands::Command;
use config::{CliConfig, Overrides};

#[derive(Parser, Debug)]
#[command(name = "docflow")]
#[command(about = "Validate, visualize and run document processing workflows", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "docflow.toml", global = true)]
    config: PathBuf,

    /// API key for the workflow service
    #[arg(long, env = "DOCFLOW_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Base URL of the workflow service
    #[arg(long, env = "DOCFLOW_BASE_URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docflow=info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Load configuration
    let config = CliConfig::load(&args.config)?;
    let overrides = Overrides {
        api_key: args.api_key,
        base_url: args.base_url,
        ..Default::default()
    };

    commands::dispatch(args.command, config, overrides).await
}
