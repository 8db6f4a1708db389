//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use pulse_pipeline::ExtractOptions;
use pulse_yahoo::YahooProvider;

/// Default address for `serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

/// Company fundamentals extraction.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "pulse")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    #[must_use]
    pub const fn default_log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the interactive JSON API.
    Serve(ServeArgs),
    /// Run one extraction and write the workbooks to disk.
    Extract(ExtractArgs),
}

/// Settings shared by every subcommand that talks to the provider.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Maximum tickers per batch
    #[arg(long, env = "PULSE_BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// Minimum delay between provider requests, in milliseconds (0 disables)
    #[arg(long, env = "PULSE_YAHOO_RATE_LIMIT_MS", default_value_t = 0)]
    pub rate_limit_ms: u64,

    /// HTTP timeout for provider requests, in seconds
    #[arg(long, env = "PULSE_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl ProviderArgs {
    /// Builds the Yahoo Finance provider.
    #[must_use]
    pub fn provider(&self) -> YahooProvider {
        YahooProvider::with_settings(
            Duration::from_millis(self.rate_limit_ms),
            Duration::from_secs(self.timeout_secs),
        )
    }

    /// Extraction options.
    #[must_use]
    pub const fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            batch_size: self.batch_size,
        }
    }
}

/// `serve` arguments.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "PULSE_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub provider: ProviderArgs,
}

/// `extract` arguments.
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Comma-separated ticker symbols, e.g. GOOGL,AAPL
    pub tickers: String,

    /// Directory the workbooks are written to
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub provider: ProviderArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_arguments() {
        let cli = Cli::try_parse_from([
            "pulse",
            "extract",
            "GOOGL,AAPL",
            "--out-dir",
            "/tmp/pulse",
            "--batch-size",
            "3",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.default_log_level(), "debug");
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.tickers, "GOOGL,AAPL");
                assert_eq!(args.out_dir, PathBuf::from("/tmp/pulse"));
                assert_eq!(args.provider.extract_options().batch_size, 3);
            }
            Commands::Serve(_) => panic!("expected extract"),
        }
    }

    #[test]
    fn test_serve_bind_argument() {
        let cli = Cli::try_parse_from(["pulse", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        assert_eq!(cli.default_log_level(), "info");
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.bind, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
                assert_eq!(args.provider.rate_limit_ms, 0);
            }
            Commands::Extract(_) => panic!("expected serve"),
        }
    }
}
