//! Migration orchestrator - wires source, cluster and sinks together.
//!
//! The driver loop is strictly sequential: open the source, resolve the
//! total, create and initialize the cluster, feed every page to
//! `start_process`, then drain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cluster::{
    ClusterOptions, InsertTaskFactory, LocalClusterMigration, NoProgress, ProgressReporter,
    StockSinkFactory, TerminalProgress, WorkerCommand,
};
use contracts::{ClusterImplementation, MigrationConfig, RecordSource, SinkType};
use ingestion::{IngestionError, JsonLinesSource, PageStream};
use observability::MigrationMetricsAggregator;
use tracing::{info, warn};

use super::MigrationStats;
use crate::cli::LogSettings;
use crate::error::Result;

/// Everything one migration run needs
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Validated configuration, CLI overrides already applied
    pub config: MigrationConfig,

    /// File the configuration came from; worker processes reload it
    pub config_path: PathBuf,

    /// Replace the configured sink with process memory
    pub dry_run: bool,

    /// Draw a progress bar on stderr
    pub show_progress: bool,

    /// Logging flags handed down to worker processes
    pub logging: LogSettings,
}

impl MigrationPlan {
    /// Sink configuration the workers will open
    fn sink_config(&self) -> contracts::SinkConfig {
        let mut sink = self.config.sink.clone();
        if self.dry_run {
            sink.sink_type = SinkType::Memory;
        }
        sink
    }

    /// Command line that re-enters this binary as worker `--worker <index>`.
    fn worker_command(&self) -> Result<WorkerCommand> {
        let program = std::env::current_exe()?;
        let mut command = WorkerCommand::new(program)
            .args(self.logging.to_args())
            .args(["worker", "--config"])
            .arg(self.config_path.display().to_string());
        if self.dry_run {
            command = command.arg("--dry-run");
        }
        Ok(command)
    }
}

/// Main migration orchestrator
pub struct Migration {
    plan: MigrationPlan,
}

impl Migration {
    /// Create a new migration with the given plan
    pub fn new(plan: MigrationPlan) -> Self {
        Self { plan }
    }

    /// Run the migration to completion
    pub async fn run(self) -> Result<MigrationStats> {
        let start_time = Instant::now();
        let config = &self.plan.config;

        let mut source = JsonLinesSource::open(&config.source.path).await?;
        let total = match config.source.total_records {
            Some(total) => total,
            None => source.count().await.map_err(IngestionError::from)?,
        };

        info!(
            implementation = %config.cluster.implementation,
            cluster_size = config.cluster.size,
            page_size = config.source.page_size,
            total_records = total,
            sink = %config.sink.name,
            dry_run = self.plan.dry_run,
            "Starting migration"
        );

        let sinks = StockSinkFactory::new(self.plan.sink_config());
        let mut backend = InsertTaskFactory::new(sinks, config.sink.insert_mode);
        if config.cluster.implementation == ClusterImplementation::Multiprocessing {
            backend = backend.with_worker_command(self.plan.worker_command()?);
        }

        let mut cluster = cluster::create(
            backend,
            config.cluster.size,
            config.cluster.implementation,
            self.cluster_options(total),
        )?;
        cluster.initialize_processes().await?;
        info!(workers = cluster.cluster_size(), "Cluster ready");

        let mut pages = PageStream::new(source, config.source.page_size)?;
        let mut metrics = MigrationMetricsAggregator::new();
        let fed = feed(&mut pages, &mut cluster, &mut metrics).await;
        if let Err(ref e) = fed {
            warn!(error = %e, offset = pages.offset(), "Source failed, draining dispatched batches");
        }

        // drain even after a source error so dispatched batches still land
        let report = cluster.awaiting_completion_processes().await?;
        fed?;

        let stats = MigrationStats::new(report, metrics, start_time.elapsed());
        info!(
            records_submitted = stats.records_submitted(),
            records_inserted = stats.records_inserted(),
            duration_secs = stats.duration.as_secs_f64(),
            "Migration completed"
        );
        Ok(stats)
    }

    fn cluster_options(&self, total: u64) -> ClusterOptions {
        let progress: Arc<dyn ProgressReporter> = if self.plan.show_progress {
            Arc::new(TerminalProgress::default())
        } else {
            Arc::new(NoProgress)
        };

        let mut options = ClusterOptions::default()
            .with_total_records(total)
            .with_progress(progress);
        if let Some(secs) = self.plan.config.cluster.startup_timeout_secs {
            options = options.with_startup_timeout(Duration::from_secs(secs));
        }
        options
    }
}

/// Stream every page into the cluster.
async fn feed<S, C>(
    pages: &mut PageStream<S>,
    cluster: &mut C,
    metrics: &mut MigrationMetricsAggregator,
) -> Result<()>
where
    S: RecordSource,
    C: LocalClusterMigration,
{
    while let Some(batch) = pages.next_page().await? {
        metrics.record_batch(batch.len());
        cluster.start_process(batch).await?;
    }
    Ok(())
}
