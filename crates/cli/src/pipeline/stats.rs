//! Migration statistics.

use std::time::Duration;

use cluster::{ClusterReport, WorkerOutcome};
use contracts::ClusterImplementation;
use observability::MigrationMetricsAggregator;

/// Statistics from one migration run
#[derive(Debug, Clone)]
pub struct MigrationStats {
    /// Strategy the cluster ran with
    pub implementation: ClusterImplementation,

    /// Number of workers
    pub cluster_size: usize,

    /// Wall time from opening the source to the end of the drain
    pub duration: Duration,

    /// Drain result
    pub report: ClusterReport,

    /// Aggregated counters for the summary
    pub metrics: MigrationMetricsAggregator,
}

impl MigrationStats {
    /// Fold the drain report into the per-batch counters collected while feeding.
    pub fn new(
        report: ClusterReport,
        mut metrics: MigrationMetricsAggregator,
        duration: Duration,
    ) -> Self {
        for _ in 0..report.lost_batches {
            metrics.record_lost();
        }
        for worker in &report.workers {
            match &worker.outcome {
                WorkerOutcome::Completed(task) => metrics.record_worker(worker.worker, task),
                WorkerOutcome::Failed { .. } => metrics.record_worker_failure(worker.worker),
            }
        }

        Self {
            implementation: report.implementation,
            cluster_size: report.workers.len(),
            duration,
            report,
            metrics,
        }
    }

    pub fn records_submitted(&self) -> u64 {
        self.report.records_submitted
    }

    pub fn records_inserted(&self) -> u64 {
        self.report.records_inserted()
    }

    /// Submitted records per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.records_submitted() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                     Migration Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Implementation: {}", self.implementation);
        println!("   ├─ Workers: {}", self.cluster_size);
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records submitted: {}", self.records_submitted());
        println!("   ├─ Records inserted: {}", self.records_inserted());
        println!("   └─ Throughput: {:.2} records/s", self.throughput());

        let summary = self.metrics.summary();

        println!("\nDispatch");
        println!("   ├─ Batches submitted: {}", summary.batches_submitted);
        println!("   ├─ Batch size: {}", summary.batch_size);
        println!("   ├─ Lost batches: {}", summary.lost_batches);
        println!("   └─ Insert rate: {:.2}%", summary.insert_rate);

        println!("\nWorkers");
        println!("   ├─ Inserts per worker: {}", summary.inserts_per_worker);
        println!("   ├─ Failed batches: {}", summary.failed_batches);
        println!("   └─ Failed workers: {}", summary.failed_workers);

        let failed = self.report.failed_workers();
        if !failed.is_empty() {
            println!("\nFailed Workers");
            for worker in &self.report.workers {
                if let WorkerOutcome::Failed { reason } = &worker.outcome {
                    println!("   ├─ {}: {}", worker.worker, reason);
                }
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster::WorkerReport;
    use contracts::{TaskReport, WorkerId};

    fn report() -> ClusterReport {
        ClusterReport {
            implementation: ClusterImplementation::Threading,
            workers: vec![
                WorkerReport::completed(
                    WorkerId(0),
                    TaskReport {
                        batches_received: 2,
                        records_inserted: 4,
                        failed_batches: 0,
                        failed_records: 0,
                    },
                ),
                WorkerReport::completed(
                    WorkerId(1),
                    TaskReport {
                        batches_received: 1,
                        records_inserted: 0,
                        failed_batches: 1,
                        failed_records: 2,
                    },
                ),
                WorkerReport::failed(WorkerId(2), "panicked: boom"),
            ],
            batches_dispatched: 4,
            records_submitted: 8,
            lost_batches: 1,
        }
    }

    #[test]
    fn test_report_folded_into_metrics() {
        let mut metrics = MigrationMetricsAggregator::new();
        for _ in 0..4 {
            metrics.record_batch(2);
        }
        let stats = MigrationStats::new(report(), metrics, Duration::from_secs(2));

        let summary = stats.metrics.summary();
        assert_eq!(summary.records_submitted, 8);
        assert_eq!(summary.records_inserted, 4);
        assert_eq!(summary.lost_batches, 1);
        assert_eq!(summary.failed_batches, 1);
        assert_eq!(summary.failed_workers, 1);
        assert_eq!(stats.cluster_size, 3);
        assert!((stats.throughput() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_throughput_zero_duration() {
        let stats = MigrationStats::new(report(), MigrationMetricsAggregator::new(), Duration::ZERO);
        assert_eq!(stats.throughput(), 0.0);
    }
}
