/// Agency: content-production toolkit
///
/// Main entry point for the `agency` binary. Loads `.env`, builds configuration
/// from the environment and `--data-dir`, sets up logging and runs one command.

use agency::cli::{self, Cli};
use agency::Config;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Environment first, then command-line overrides
    let mut config = Config::default();
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Using data directory {}", config.storage.data_dir.display());
    cli::run(cli, config).await
}
