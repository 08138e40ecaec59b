//! Entry point for the trailhead permit tracker.
//! One invocation performs one full poll: fetch the reservation report,
//! compute availability, and notify the configured channels when the
//! rendered report changed.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod run;

use config::TrackerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "tracker",
    version,
    about = "Trailhead permit availability tracker"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "TRACKER_CONFIG", default_value = "tracker.toml")]
    config: PathBuf,

    /// Fetch and print the report, but skip persistence and notifications
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = TrackerConfig::load(&cli.config)?;

    run::run_once(&config, cli.dry_run).await
}
