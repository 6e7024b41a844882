//! Cooperative tasks on the producer's thread.
//!
//! Workers live on a [`LocalSet`] the cluster owns and only make progress
//! while the cluster is driving it: each `start_process` hands the batch over
//! and then yields once, so every woken worker runs until its next `recv` or
//! sink await before control returns to the producer. Producer and workers
//! therefore interleave on one OS thread whatever runtime flavor the caller
//! uses, and the cluster itself is not `Send`.

use std::collections::HashMap;

use contracts::{Batch, BackendTask, ClusterImplementation, ContractError, TaskReport, WorkerId};
use tokio::sync::oneshot;
use tokio::task::{Id, JoinSet, LocalSet};
use tracing::{info, instrument, warn};

use super::LocalClusterMigration;
use crate::backend::BackendTaskFactory;
use crate::channel::local::{self, LocalSender};
use crate::dispatch::{panic_message, with_startup_timeout, ClusterCore, ClusterOptions};
use crate::error::ClusterError;
use crate::progress::Progress;
use crate::report::{ClusterReport, WorkerReport};

type Joined = JoinSet<Result<TaskReport, ContractError>>;

pub struct TaskCluster<F> {
    core: ClusterCore,
    factory: F,
    senders: Vec<LocalSender>,
    local: LocalSet,
    tasks: Joined,
    workers: HashMap<Id, WorkerId>,
}

impl<F: BackendTaskFactory> TaskCluster<F> {
    pub fn new(factory: F, cluster_size: usize, options: ClusterOptions) -> Result<Self, ClusterError> {
        Ok(Self {
            core: ClusterCore::new(ClusterImplementation::Asyncio, cluster_size, options)?,
            factory,
            senders: Vec::with_capacity(cluster_size),
            local: LocalSet::new(),
            tasks: JoinSet::new(),
            workers: HashMap::with_capacity(cluster_size),
        })
    }

    fn spawn_worker(&mut self, worker: WorkerId) -> oneshot::Receiver<()> {
        let (tx, rx) = local::channel(worker);
        let (ready_tx, ready_rx) = oneshot::channel();
        let task = self.factory.create(worker);

        let handle = self.tasks.spawn_local_on(
            async move {
                let _ = ready_tx.send(());
                task.run(rx).await
            },
            &self.local,
        );
        self.workers.insert(handle.id(), worker);
        self.senders.push(tx);
        ready_rx
    }

    /// Close every channel and run the workers until all of them returned.
    async fn stop_workers(&mut self) -> Vec<WorkerReport> {
        self.core.broadcast_shutdown(&mut self.senders).await;
        self.senders.clear();
        self.local
            .run_until(join_all(&mut self.tasks, &mut self.workers))
            .await
    }

    async fn abort_startup(&mut self) {
        self.stop_workers().await;
        self.core.mark_failed();
    }
}

/// Join every task; one failing task never stops the others being joined.
async fn join_all(tasks: &mut Joined, workers: &mut HashMap<Id, WorkerId>) -> Vec<WorkerReport> {
    let mut reports = Vec::with_capacity(workers.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        let report = match joined {
            Ok((id, result)) => {
                let Some(worker) = worker_for(workers, id) else {
                    continue;
                };
                match result {
                    Ok(report) => WorkerReport::completed(worker, report),
                    Err(e) => {
                        warn!(%worker, error = %e, "worker task failed");
                        WorkerReport::failed(worker, e.to_string())
                    }
                }
            }
            Err(e) => {
                let Some(worker) = worker_for(workers, e.id()) else {
                    continue;
                };
                let reason = if e.is_panic() {
                    format!("panicked: {}", panic_message(&*e.into_panic()))
                } else {
                    "cancelled".to_string()
                };
                warn!(%worker, %reason, "worker task died");
                WorkerReport::failed(worker, reason)
            }
        };
        reports.push(report);
    }
    workers.clear();
    reports
}

fn worker_for(workers: &HashMap<Id, WorkerId>, id: Id) -> Option<WorkerId> {
    let worker = workers.get(&id).copied();
    if worker.is_none() {
        warn!(task = %id, "joined a task that is not a worker");
    }
    worker
}

async fn wait_ready(pending: Vec<(WorkerId, oneshot::Receiver<()>)>) -> Result<(), ClusterError> {
    for (worker, ready) in pending {
        ready
            .await
            .map_err(|_| ClusterError::worker_startup(worker, "task ended before ready"))?;
    }
    Ok(())
}

impl<F: BackendTaskFactory> LocalClusterMigration for TaskCluster<F> {
    fn implementation(&self) -> ClusterImplementation {
        self.core.implementation()
    }

    fn cluster_size(&self) -> usize {
        self.core.cluster_size()
    }

    fn progress(&self) -> Progress {
        self.core.progress()
    }

    #[instrument(name = "task_cluster_initialize", skip(self), fields(size = self.core.cluster_size()))]
    async fn initialize_processes(&mut self) -> Result<(), ClusterError> {
        self.core.ensure_created()?;

        let pending: Vec<_> = (0..self.core.cluster_size())
            .map(|index| (WorkerId(index), self.spawn_worker(WorkerId(index))))
            .collect();

        let ready = with_startup_timeout(self.core.startup_timeout(), wait_ready(pending));
        if let Err(e) = self.local.run_until(ready).await {
            self.abort_startup().await;
            return Err(e);
        }

        self.core.mark_running();
        info!(workers = self.core.cluster_size(), "task workers ready");
        Ok(())
    }

    async fn start_process(&mut self, batch: Batch) -> Result<(), ClusterError> {
        self.core.dispatch(&mut self.senders, batch).await?;
        // one scheduling round for the workers before the producer resumes
        self.local.run_until(tokio::task::yield_now()).await;
        Ok(())
    }

    #[instrument(name = "task_cluster_drain", skip(self))]
    async fn awaiting_completion_processes(&mut self) -> Result<ClusterReport, ClusterError> {
        if let Some(report) = self.core.cached_report() {
            return Ok(report);
        }
        self.core.ensure_running()?;

        let workers = self.stop_workers().await;
        Ok(self.core.finish(workers))
    }
}
