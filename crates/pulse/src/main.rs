//! Pulse binary entry point.

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use pulse::commands;
use pulse::config::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => commands::serve(args).await,
        Commands::Extract(args) => commands::extract(args).await,
    }
}
