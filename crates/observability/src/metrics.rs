//! Migration metrics
//!
//! Prometheus counters for the dispatch path plus an in-memory aggregator used
//! for the end-of-run summary.

use std::collections::BTreeMap;

use contracts::{TaskReport, WorkerId};
use metrics::{counter, gauge, histogram};

/// Record one batch handed to a worker channel.
///
/// Called on every dispatch; never blocks.
pub fn record_batch_dispatched(worker: WorkerId, records: usize) {
    counter!("user_migrate_batches_dispatched_total").increment(1);
    counter!("user_migrate_records_submitted_total").increment(records as u64);
    counter!(
        "user_migrate_worker_batches_total",
        "worker" => worker.to_string()
    )
    .increment(1);
    histogram!("user_migrate_batch_size").record(records as f64);
}

/// Record a batch whose worker channel was already closed.
pub fn record_batch_lost(worker: WorkerId, records: usize) {
    counter!(
        "user_migrate_batches_lost_total",
        "worker" => worker.to_string()
    )
    .increment(1);
    counter!("user_migrate_records_lost_total").increment(records as u64);
}

/// Record the number of workers that completed the startup handshake.
pub fn record_workers_ready(count: usize) {
    gauge!("user_migrate_workers_ready").set(count as f64);
}

/// Record the final counters of one worker.
pub fn record_worker_report(worker: WorkerId, report: &TaskReport) {
    let label = worker.to_string();
    counter!("user_migrate_records_inserted_total", "worker" => label.clone())
        .increment(report.records_inserted);
    if report.failed_batches > 0 {
        counter!("user_migrate_failed_batches_total", "worker" => label)
            .increment(report.failed_batches);
    }
}

/// Record a worker that stopped without a report (crash, panic, spawn loss).
pub fn record_worker_failed(worker: WorkerId) {
    counter!(
        "user_migrate_workers_failed_total",
        "worker" => worker.to_string()
    )
    .increment(1);
}

/// Migration metrics aggregator
///
/// Aggregates in memory so a summary can be printed at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct MigrationMetricsAggregator {
    /// Batches submitted to the cluster
    pub batches_submitted: u64,

    /// Records submitted to the cluster
    pub records_submitted: u64,

    /// Batches whose worker was already gone
    pub lost_batches: u64,

    /// Batch size statistics
    pub batch_size_stats: RunningStats,

    /// Inserted records per worker
    pub worker_inserts: BTreeMap<WorkerId, u64>,

    /// Batches rejected by the sink, summed over workers
    pub failed_batches: u64,

    /// Workers that stopped without a report
    pub failed_workers: u64,
}

impl MigrationMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one submitted batch
    pub fn record_batch(&mut self, records: usize) {
        self.batches_submitted += 1;
        self.records_submitted += records as u64;
        self.batch_size_stats.push(records as f64);
    }

    /// Account for a lost batch
    pub fn record_lost(&mut self) {
        self.lost_batches += 1;
    }

    /// Account for a worker's final report
    pub fn record_worker(&mut self, worker: WorkerId, report: &TaskReport) {
        *self.worker_inserts.entry(worker).or_insert(0) += report.records_inserted;
        self.failed_batches += report.failed_batches;
    }

    /// Account for a worker that failed
    pub fn record_worker_failure(&mut self, worker: WorkerId) {
        self.worker_inserts.entry(worker).or_insert(0);
        self.failed_workers += 1;
    }

    /// Generate a summary report
    pub fn summary(&self) -> MetricsSummary {
        let mut per_worker = RunningStats::default();
        for inserted in self.worker_inserts.values() {
            per_worker.push(*inserted as f64);
        }
        let records_inserted: u64 = self.worker_inserts.values().sum();

        MetricsSummary {
            batches_submitted: self.batches_submitted,
            records_submitted: self.records_submitted,
            records_inserted,
            lost_batches: self.lost_batches,
            failed_batches: self.failed_batches,
            failed_workers: self.failed_workers,
            insert_rate: if self.records_submitted > 0 {
                records_inserted as f64 / self.records_submitted as f64 * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_size_stats),
            inserts_per_worker: StatsSummary::from(&per_worker),
        }
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub batches_submitted: u64,
    pub records_submitted: u64,
    pub records_inserted: u64,
    pub lost_batches: u64,
    pub failed_batches: u64,
    pub failed_workers: u64,
    pub insert_rate: f64,
    pub batch_size: StatsSummary,
    pub inserts_per_worker: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Migration Metrics Summary ===")?;
        writeln!(f, "Batches submitted: {}", self.batches_submitted)?;
        writeln!(f, "Records submitted: {}", self.records_submitted)?;
        writeln!(
            f,
            "Records inserted: {} ({:.2}%)",
            self.records_inserted, self.insert_rate
        )?;
        writeln!(f, "Lost batches: {}", self.lost_batches)?;
        writeln!(f, "Failed batches: {}", self.failed_batches)?;
        writeln!(f, "Failed workers: {}", self.failed_workers)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Inserts per worker: {}", self.inserts_per_worker)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
