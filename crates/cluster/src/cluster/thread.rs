//! One OS thread per worker.
//!
//! Each thread owns a current-thread runtime and drives its backend task to
//! completion on it; nothing is shared with the producer's runtime except the
//! queue.

use std::thread::{self, JoinHandle};

use contracts::{Batch, ClusterImplementation, ContractError, TaskReport, WorkerId};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use super::ClusterMigration;
use crate::backend::BackendTaskFactory;
use crate::channel::queue::{self, QueueSender};
use crate::dispatch::{panic_message, with_startup_timeout, ClusterCore, ClusterOptions};
use crate::error::ClusterError;
use crate::progress::Progress;
use crate::report::{ClusterReport, WorkerReport};

type WorkerThread = JoinHandle<Result<TaskReport, ContractError>>;

pub struct ThreadCluster<F> {
    core: ClusterCore,
    factory: F,
    senders: Vec<QueueSender>,
    threads: Vec<(WorkerId, WorkerThread)>,
}

impl<F: BackendTaskFactory> ThreadCluster<F> {
    pub fn new(factory: F, cluster_size: usize, options: ClusterOptions) -> Result<Self, ClusterError> {
        Ok(Self {
            core: ClusterCore::new(ClusterImplementation::Threading, cluster_size, options)?,
            factory,
            senders: Vec::with_capacity(cluster_size),
            threads: Vec::with_capacity(cluster_size),
        })
    }

    fn spawn_worker(&mut self, worker: WorkerId) -> Result<oneshot::Receiver<()>, ClusterError> {
        let (tx, rx) = queue::channel(worker);
        let (ready_tx, ready_rx) = oneshot::channel();
        let task = self.factory.create(worker);

        let handle = thread::Builder::new()
            .name(worker.to_string())
            .spawn(move || -> Result<TaskReport, ContractError> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                let _ = ready_tx.send(());
                runtime.block_on(contracts::BackendTask::run(task, rx))
            })
            .map_err(|source| ClusterError::Spawn { worker, source })?;

        self.senders.push(tx);
        self.threads.push((worker, handle));
        Ok(ready_rx)
    }

    /// Stop whatever was started, after a failed initialization.
    async fn abort_startup(&mut self) {
        self.core.broadcast_shutdown(&mut self.senders).await;
        self.senders.clear();
        let reports = join_all(std::mem::take(&mut self.threads)).await;
        debug!(workers = reports.len(), "aborted workers joined");
        self.core.mark_failed();
    }
}

async fn wait_ready(pending: Vec<(WorkerId, oneshot::Receiver<()>)>) -> Result<(), ClusterError> {
    for (worker, ready) in pending {
        ready
            .await
            .map_err(|_| ClusterError::worker_startup(worker, "thread exited before ready"))?;
    }
    Ok(())
}

async fn join_all(threads: Vec<(WorkerId, WorkerThread)>) -> Vec<WorkerReport> {
    let mut reports = Vec::with_capacity(threads.len());
    for (worker, handle) in threads {
        let joined = tokio::task::spawn_blocking(move || handle.join()).await;
        let report = match joined {
            Ok(Ok(Ok(report))) => WorkerReport::completed(worker, report),
            Ok(Ok(Err(e))) => {
                warn!(%worker, error = %e, "worker task failed");
                WorkerReport::failed(worker, e.to_string())
            }
            Ok(Err(payload)) => {
                let reason = format!("panicked: {}", panic_message(&*payload));
                warn!(%worker, %reason, "worker thread died");
                WorkerReport::failed(worker, reason)
            }
            Err(e) => WorkerReport::failed(worker, format!("join failed: {e}")),
        };
        reports.push(report);
    }
    reports
}

impl<F: BackendTaskFactory> ClusterMigration for ThreadCluster<F> {
    fn implementation(&self) -> ClusterImplementation {
        self.core.implementation()
    }

    fn cluster_size(&self) -> usize {
        self.core.cluster_size()
    }

    fn progress(&self) -> Progress {
        self.core.progress()
    }

    #[instrument(name = "thread_cluster_initialize", skip(self), fields(size = self.core.cluster_size()))]
    async fn initialize_processes(&mut self) -> Result<(), ClusterError> {
        self.core.ensure_created()?;

        let mut pending = Vec::with_capacity(self.core.cluster_size());
        for index in 0..self.core.cluster_size() {
            match self.spawn_worker(WorkerId(index)) {
                Ok(ready) => pending.push((WorkerId(index), ready)),
                Err(e) => {
                    self.abort_startup().await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = with_startup_timeout(self.core.startup_timeout(), wait_ready(pending)).await {
            self.abort_startup().await;
            return Err(e);
        }

        self.core.mark_running();
        info!(workers = self.core.cluster_size(), "thread workers ready");
        Ok(())
    }

    async fn start_process(&mut self, batch: Batch) -> Result<(), ClusterError> {
        self.core.dispatch(&mut self.senders, batch).await.map(|_| ())
    }

    #[instrument(name = "thread_cluster_drain", skip(self))]
    async fn awaiting_completion_processes(&mut self) -> Result<ClusterReport, ClusterError> {
        if let Some(report) = self.core.cached_report() {
            return Ok(report);
        }
        self.core.ensure_running()?;

        self.core.broadcast_shutdown(&mut self.senders).await;
        self.senders.clear();
        let workers = join_all(std::mem::take(&mut self.threads)).await;
        Ok(self.core.finish(workers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Lifecycle;
    use crate::testing::{batch, Journal, RecordingTask};

    fn recording(size: usize, journal: &Journal) -> ThreadCluster<impl BackendTaskFactory> {
        let journal = journal.clone();
        ThreadCluster::new(
            move |worker: WorkerId| RecordingTask::new(worker, journal.clone()),
            size,
            ClusterOptions::default(),
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_round_robin_and_drain() {
        let journal = Journal::default();
        let mut cluster = recording(3, &journal);
        cluster.initialize_processes().await.unwrap();

        for names in [["u1", "u2"], ["u3", "u4"], ["u5", "u6"], ["u7", "u8"]] {
            cluster.start_process(batch(&names)).await.unwrap();
        }
        let report = cluster.awaiting_completion_processes().await.unwrap();

        assert_eq!(journal.batches(WorkerId(0)), vec![vec!["u1", "u2"], vec!["u7", "u8"]]);
        assert_eq!(journal.batches(WorkerId(1)), vec![vec!["u3", "u4"]]);
        assert_eq!(journal.batches(WorkerId(2)), vec![vec!["u5", "u6"]]);
        for index in 0..3 {
            assert_eq!(journal.shutdowns(WorkerId(index)), 1);
        }
        assert_eq!(report.records_inserted(), 8);
        assert_eq!(report.batches_dispatched, 4);
        assert!(report.is_clean());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_workers_still_get_one_sentinel() {
        let journal = Journal::default();
        let mut cluster = recording(5, &journal);
        cluster.initialize_processes().await.unwrap();
        cluster.start_process(batch(&["u1"])).await.unwrap();
        cluster.awaiting_completion_processes().await.unwrap();

        for index in 0..5 {
            let events = journal.events(WorkerId(index));
            assert_eq!(journal.shutdowns(WorkerId(index)), 1);
            assert_eq!(events.last(), Some(&crate::testing::Event::Shutdown));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lifecycle_errors_and_cached_drain() {
        let journal = Journal::default();
        let mut cluster = recording(2, &journal);

        let err = cluster.start_process(batch(&["u1"])).await.unwrap_err();
        assert!(matches!(err, ClusterError::NotRunning { state: Lifecycle::Created }));

        cluster.initialize_processes().await.unwrap();
        assert!(matches!(
            cluster.initialize_processes().await,
            Err(ClusterError::AlreadyInitialized)
        ));

        let first = cluster.awaiting_completion_processes().await.unwrap();
        let second = cluster.awaiting_completion_processes().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(journal.shutdowns(WorkerId(0)), 1);

        let err = cluster.start_process(batch(&["u2"])).await.unwrap_err();
        assert!(matches!(err, ClusterError::NotRunning { state: Lifecycle::Drained }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_worker_does_not_block_drain() {
        let journal = Journal::default();
        let task_journal = journal.clone();
        let mut cluster = ThreadCluster::new(
            move |worker: WorkerId| {
                let task = RecordingTask::new(worker, task_journal.clone());
                if worker == WorkerId(0) {
                    task.panic_on_batch(0)
                } else {
                    task
                }
            },
            2,
            ClusterOptions::default(),
        )
        .unwrap();

        cluster.initialize_processes().await.unwrap();
        cluster.start_process(batch(&["u1"])).await.unwrap();
        cluster.start_process(batch(&["u2"])).await.unwrap();
        let report = cluster.awaiting_completion_processes().await.unwrap();

        assert_eq!(report.failed_workers(), vec![WorkerId(0)]);
        assert_eq!(report.records_inserted(), 1);
        assert_eq!(journal.usernames(WorkerId(1)), vec!["u2"]);
    }
}
