//! # user-migrate
//!
//! Command-line entry point for the clustered user migration.
//!
//! Provides:
//! - configuration loading and validation
//! - the migration driver (`run`) and the strategy benchmark (`bench`)
//! - the hidden `worker` command backing process-isolated clusters
//!
//! Every log line goes to stderr; stdout carries summaries, and for `worker`
//! the control frames read by the parent.

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands, LogSettings};
use commands::{run_bench, run_migration, run_seed, run_validate, run_worker};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let logging = cli.log_settings();
    init_logging(logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = cli.command.name(),
        "user-migrate starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_migration(args, logging).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Bench(args) => run_bench(args, logging).await,
        Commands::Seed(args) => run_seed(args),
        Commands::Worker(args) => run_worker(args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(logging: LogSettings) -> Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: logging.format.into(),
        metrics_port: None,
        default_log_level: logging.default_level().to_string(),
    })
}
