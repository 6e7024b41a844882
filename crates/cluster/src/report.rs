//! Final accounting returned by a drain.

use contracts::{ClusterImplementation, TaskReport, WorkerId};
use serde::Serialize;

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Completed(TaskReport),
    /// Crashed, panicked, or the task returned an error
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub worker: WorkerId,
    pub outcome: WorkerOutcome,
}

impl WorkerReport {
    pub fn completed(worker: WorkerId, report: TaskReport) -> Self {
        Self {
            worker,
            outcome: WorkerOutcome::Completed(report),
        }
    }

    pub fn failed(worker: WorkerId, reason: impl Into<String>) -> Self {
        Self {
            worker,
            outcome: WorkerOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn task_report(&self) -> Option<&TaskReport> {
        match &self.outcome {
            WorkerOutcome::Completed(report) => Some(report),
            WorkerOutcome::Failed { .. } => None,
        }
    }
}

/// Result of `awaiting_completion_processes`.
///
/// `records_submitted` counts what the producer handed out; `records_inserted`
/// what the workers say they persisted. A gap between the two is data lost to
/// rejected batches or dead workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterReport {
    pub implementation: ClusterImplementation,
    pub workers: Vec<WorkerReport>,
    pub batches_dispatched: u64,
    pub records_submitted: u64,
    pub lost_batches: u64,
}

impl ClusterReport {
    /// Sum of every completed worker's counters.
    pub fn totals(&self) -> TaskReport {
        let mut total = TaskReport::default();
        for report in self.workers.iter().filter_map(WorkerReport::task_report) {
            total += *report;
        }
        total
    }

    pub fn records_inserted(&self) -> u64 {
        self.totals().records_inserted
    }

    pub fn failed_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|w| w.task_report().is_none())
            .map(|w| w.worker)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        let totals = self.totals();
        self.lost_batches == 0 && totals.failed_batches == 0 && self.failed_workers().is_empty()
    }
}
