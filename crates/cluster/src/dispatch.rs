//! State every variant wraps: counters, lifecycle, options, progress.

use std::sync::Arc;
use std::time::Duration;

use contracts::{Batch, ClusterImplementation, WorkerId, WorkerMessage};
use tracing::{debug, error, warn};

use crate::channel::BatchSender;
use crate::error::ClusterError;
use crate::progress::{NoProgress, Progress, ProgressReporter};
use crate::report::{ClusterReport, WorkerReport};
use crate::state::{DispatchState, Lifecycle};

/// Construction options shared by all variants.
#[derive(Clone)]
pub struct ClusterOptions {
    /// Expected record count, for progress display only
    pub total_records: Option<u64>,
    /// Upper bound on the startup handshake; `None` waits forever
    pub startup_timeout: Option<Duration>,
    pub progress: Arc<dyn ProgressReporter>,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            total_records: None,
            startup_timeout: None,
            progress: Arc::new(NoProgress),
        }
    }
}

impl std::fmt::Debug for ClusterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterOptions")
            .field("total_records", &self.total_records)
            .field("startup_timeout", &self.startup_timeout)
            .finish_non_exhaustive()
    }
}

impl ClusterOptions {
    pub fn with_total_records(mut self, total: u64) -> Self {
        self.total_records = Some(total);
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }
}

pub(crate) struct ClusterCore {
    implementation: ClusterImplementation,
    state: DispatchState,
    lifecycle: Lifecycle,
    options: ClusterOptions,
    report: Option<ClusterReport>,
}

impl ClusterCore {
    /// Rejects a zero-sized pool.
    pub(crate) fn new(
        implementation: ClusterImplementation,
        cluster_size: usize,
        options: ClusterOptions,
    ) -> Result<Self, ClusterError> {
        if cluster_size == 0 {
            return Err(ClusterError::invalid_config(
                "cluster size must be a positive integer",
            ));
        }
        Ok(Self {
            implementation,
            state: DispatchState::new(cluster_size),
            lifecycle: Lifecycle::Created,
            options,
            report: None,
        })
    }

    pub(crate) fn implementation(&self) -> ClusterImplementation {
        self.implementation
    }

    pub(crate) fn cluster_size(&self) -> usize {
        self.state.cluster_size()
    }

    pub(crate) fn startup_timeout(&self) -> Option<Duration> {
        self.options.startup_timeout
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub(crate) fn progress(&self) -> Progress {
        Progress {
            batches_submitted: self.state.dispatched(),
            records_submitted: self.state.records_submitted(),
            total_records: self.options.total_records,
        }
    }

    pub(crate) fn ensure_created(&self) -> Result<(), ClusterError> {
        match self.lifecycle {
            Lifecycle::Created => Ok(()),
            _ => Err(ClusterError::AlreadyInitialized),
        }
    }

    pub(crate) fn ensure_running(&self) -> Result<(), ClusterError> {
        match self.lifecycle {
            Lifecycle::Running => Ok(()),
            state => Err(ClusterError::NotRunning { state }),
        }
    }

    pub(crate) fn mark_running(&mut self) {
        observability::record_workers_ready(self.cluster_size());
        self.lifecycle = Lifecycle::Running;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.lifecycle = Lifecycle::Failed;
    }

    /// Send `batch` to the next worker in rotation.
    ///
    /// A dead worker's batch is logged and counted as lost; the rotation and
    /// progress advance either way.
    pub(crate) async fn dispatch<S: BatchSender>(
        &mut self,
        senders: &mut [S],
        batch: Batch,
    ) -> Result<WorkerId, ClusterError> {
        self.ensure_running()?;

        let worker = self.state.select();
        let records = batch.len();
        match senders[worker.index()]
            .send(WorkerMessage::Batch(batch))
            .await
        {
            Ok(()) => observability::record_batch_dispatched(worker, records),
            Err(e) => {
                error!(%worker, records, error = %e, "batch lost, worker unreachable");
                self.state.record_lost();
                observability::record_batch_lost(worker, records);
            }
        }
        self.state.advance(records);
        self.options.progress.report(self.progress());
        Ok(worker)
    }

    /// Send the shutdown sentinel to every worker, once each.
    pub(crate) async fn broadcast_shutdown<S: BatchSender>(&mut self, senders: &mut [S]) {
        for (index, sender) in senders.iter_mut().enumerate() {
            let worker = WorkerId(index);
            match sender.send(WorkerMessage::Shutdown).await {
                Ok(()) => debug!(%worker, "shutdown sent"),
                Err(e) => warn!(%worker, error = %e, "worker gone before shutdown"),
            }
        }
    }

    pub(crate) fn cached_report(&self) -> Option<ClusterReport> {
        self.report.clone()
    }

    /// Close the books after every worker has stopped.
    pub(crate) fn finish(&mut self, mut workers: Vec<WorkerReport>) -> ClusterReport {
        workers.sort_by_key(|w| w.worker);
        for worker in &workers {
            match worker.task_report() {
                Some(report) => observability::record_worker_report(worker.worker, report),
                None => observability::record_worker_failed(worker.worker),
            }
        }

        let report = ClusterReport {
            implementation: self.implementation,
            workers,
            batches_dispatched: self.state.dispatched(),
            records_submitted: self.state.records_submitted(),
            lost_batches: self.state.lost_batches(),
        };
        self.lifecycle = Lifecycle::Drained;
        self.report = Some(report.clone());
        report
    }
}

/// Await `startup` under the optional handshake deadline.
pub(crate) async fn with_startup_timeout<T>(
    timeout: Option<Duration>,
    startup: impl std::future::Future<Output = Result<T, ClusterError>>,
) -> Result<T, ClusterError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, startup)
            .await
            .map_err(|_| ClusterError::StartupTimeout {
                waited_ms: limit.as_millis() as u64,
            })?,
        None => startup.await,
    }
}

/// Human-readable panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::local;
    use contracts::BatchReceiver;

    #[test]
    fn test_zero_size_rejected() {
        let result = ClusterCore::new(ClusterImplementation::Asyncio, 0, Default::default());
        assert!(matches!(result, Err(ClusterError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_dispatch_requires_running() {
        let mut core =
            ClusterCore::new(ClusterImplementation::Asyncio, 1, Default::default()).unwrap();
        let (tx, _rx) = local::channel(WorkerId(0));
        let mut senders = vec![tx];
        let err = core
            .dispatch(&mut senders, Batch::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClusterError::NotRunning {
                state: Lifecycle::Created
            }
        ));
    }

    #[tokio::test]
    async fn test_lost_batch_still_advances() {
        let mut core =
            ClusterCore::new(ClusterImplementation::Asyncio, 2, Default::default()).unwrap();
        core.mark_running();

        let (tx0, mut rx0) = local::channel(WorkerId(0));
        let (tx1, rx1) = local::channel(WorkerId(1));
        drop(rx1);
        let mut senders = vec![tx0, tx1];

        let batch = || Batch::new(vec![contracts::UserRecord::new("a", "a@x", 1)]);
        assert_eq!(core.dispatch(&mut senders, batch()).await.unwrap(), WorkerId(0));
        assert_eq!(core.dispatch(&mut senders, batch()).await.unwrap(), WorkerId(1));
        assert_eq!(core.dispatch(&mut senders, batch()).await.unwrap(), WorkerId(0));

        assert_eq!(core.progress().records_submitted, 3);
        core.broadcast_shutdown(&mut senders).await;
        let report = core.finish(Vec::new());
        assert_eq!(report.lost_batches, 1);
        assert_eq!(report.batches_dispatched, 3);
        assert_eq!(core.lifecycle(), Lifecycle::Drained);

        // worker 0 got two batches then the sentinel
        assert!(!rx0.recv().await.unwrap().is_shutdown());
        assert!(!rx0.recv().await.unwrap().is_shutdown());
        assert!(rx0.recv().await.unwrap().is_shutdown());
    }

    #[tokio::test]
    async fn test_startup_timeout() {
        let result: Result<(), _> = with_startup_timeout(
            Some(Duration::from_millis(10)),
            std::future::pending::<Result<(), ClusterError>>(),
        )
        .await;
        assert!(matches!(result, Err(ClusterError::StartupTimeout { waited_ms: 10 })));
    }
}
