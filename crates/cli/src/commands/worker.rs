//! Hidden `worker` command: child side of a process cluster.
//!
//! Stdout belongs to the parent's control channel; this command must not
//! print anything itself.

use anyhow::{Context, Result};
use cluster::{BackendTaskFactory, InsertTaskFactory, StockSinkFactory};
use contracts::{SinkType, WorkerId};
use tracing::info;

use super::load_config;
use crate::cli::WorkerArgs;

/// Execute the `worker` command
pub async fn run_worker(args: &WorkerArgs) -> Result<()> {
    let worker = WorkerId(args.worker);
    let config = load_config(&args.config)
        .with_context(|| format!("{worker}: failed to load config from {}", args.config.display()))?;

    let mut sink = config.sink;
    if args.dry_run {
        sink.sink_type = SinkType::Memory;
    }
    let insert_mode = sink.insert_mode;
    let factory = InsertTaskFactory::new(StockSinkFactory::new(sink), insert_mode);

    info!(%worker, pid = std::process::id(), "Worker process starting");
    let report = cluster::serve_worker(factory.create(worker))
        .await
        .with_context(|| format!("{worker} stopped abnormally"))?;

    info!(
        %worker,
        batches = report.batches_received,
        inserted = report.records_inserted,
        "Worker process exiting"
    );
    Ok(())
}
