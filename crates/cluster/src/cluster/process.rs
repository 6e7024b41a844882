//! One OS process per worker.
//!
//! Batches are serialized onto the child's stdin; the child answers on its
//! stdout with a `Ready` frame after startup and a `Finished` or `Failed`
//! frame before it exits. Child stderr is inherited so worker logs reach the
//! operator.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use contracts::{Batch, ClusterImplementation, WorkerId};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, instrument, warn};

use super::ClusterMigration;
use crate::backend::BackendTaskFactory;
use crate::channel::pipe::{read_frame, ControlFrame, PipeSender};
use crate::dispatch::{with_startup_timeout, ClusterCore, ClusterOptions};
use crate::error::ClusterError;
use crate::progress::Progress;
use crate::report::{ClusterReport, WorkerReport};

/// How long an aborted worker gets to exit before it is killed
const ABORT_GRACE: Duration = Duration::from_secs(2);

struct ProcessWorker {
    id: WorkerId,
    child: Child,
    control: ChildStdout,
}

pub struct ProcessCluster<F> {
    core: ClusterCore,
    factory: F,
    senders: Vec<PipeSender<ChildStdin>>,
    workers: Vec<ProcessWorker>,
}

impl<F: BackendTaskFactory> ProcessCluster<F> {
    /// Fails if `factory` cannot describe a worker command.
    pub fn new(factory: F, cluster_size: usize, options: ClusterOptions) -> Result<Self, ClusterError> {
        let core = ClusterCore::new(ClusterImplementation::Multiprocessing, cluster_size, options)?;
        if factory.worker_command(WorkerId(0)).is_none() {
            return Err(ClusterError::invalid_config(
                "backend task has no worker command, it cannot run in separate processes",
            ));
        }
        Ok(Self {
            core,
            factory,
            senders: Vec::with_capacity(cluster_size),
            workers: Vec::with_capacity(cluster_size),
        })
    }

    fn spawn_worker(&mut self, worker: WorkerId) -> Result<(), ClusterError> {
        let spec = self.factory.worker_command(worker).ok_or_else(|| {
            ClusterError::invalid_config(format!("no worker command for {worker}"))
        })?;

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ClusterError::Spawn { worker, source })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(ClusterError::worker_startup(worker, "stdio pipes missing"));
        };
        debug!(%worker, pid = child.id(), "worker process spawned");

        self.senders.push(PipeSender::new(worker, stdin));
        self.workers.push(ProcessWorker {
            id: worker,
            child,
            control: stdout,
        });
        Ok(())
    }

    async fn abort_startup(&mut self) {
        self.core.broadcast_shutdown(&mut self.senders).await;
        self.senders.clear();
        for mut worker in self.workers.drain(..) {
            match tokio::time::timeout(ABORT_GRACE, worker.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(worker = %worker.id, "worker did not exit, killing");
                    let _ = worker.child.kill().await;
                }
            }
        }
        self.core.mark_failed();
    }
}

async fn handshake(workers: &mut [ProcessWorker]) -> Result<(), ClusterError> {
    for worker in workers.iter_mut() {
        let frame: Option<ControlFrame> = read_frame(&mut worker.control)
            .await
            .map_err(|e| ClusterError::worker_startup(worker.id, e.to_string()))?;
        match frame {
            Some(ControlFrame::Ready { pid }) => debug!(worker = %worker.id, pid, "worker ready"),
            Some(other) => {
                return Err(ClusterError::worker_startup(
                    worker.id,
                    format!("expected ready frame, got {other:?}"),
                ))
            }
            None => {
                return Err(ClusterError::worker_startup(
                    worker.id,
                    "process exited before ready",
                ))
            }
        }
    }
    Ok(())
}

/// Read the final control frame, then reap the process.
async fn collect(mut worker: ProcessWorker) -> WorkerReport {
    let id = worker.id;
    let frame = read_frame::<_, ControlFrame>(&mut worker.control).await;
    let status = worker.child.wait().await;

    match (frame, status) {
        (Ok(Some(ControlFrame::Finished(report))), Ok(status)) if status.success() => {
            WorkerReport::completed(id, report)
        }
        (Ok(Some(ControlFrame::Finished(report))), Ok(status)) => {
            warn!(worker = %id, %status, "worker reported but exited uncleanly");
            WorkerReport::completed(id, report)
        }
        (Ok(Some(ControlFrame::Failed { message })), _) => {
            warn!(worker = %id, error = %message, "worker task failed");
            WorkerReport::failed(id, message)
        }
        (frame, status) => {
            let reason = describe_exit(status.ok());
            warn!(worker = %id, frame = ?frame.ok().flatten(), %reason, "worker died without report");
            WorkerReport::failed(id, reason)
        }
    }
}

fn describe_exit(status: Option<ExitStatus>) -> String {
    match status {
        Some(status) => format!("exited with {status} before reporting"),
        None => "exit status unavailable".to_string(),
    }
}

impl<F: BackendTaskFactory> ClusterMigration for ProcessCluster<F> {
    fn implementation(&self) -> ClusterImplementation {
        self.core.implementation()
    }

    fn cluster_size(&self) -> usize {
        self.core.cluster_size()
    }

    fn progress(&self) -> Progress {
        self.core.progress()
    }

    #[instrument(name = "process_cluster_initialize", skip(self), fields(size = self.core.cluster_size()))]
    async fn initialize_processes(&mut self) -> Result<(), ClusterError> {
        self.core.ensure_created()?;

        for index in 0..self.core.cluster_size() {
            if let Err(e) = self.spawn_worker(WorkerId(index)) {
                self.abort_startup().await;
                return Err(e);
            }
        }

        let result =
            with_startup_timeout(self.core.startup_timeout(), handshake(&mut self.workers)).await;
        if let Err(e) = result {
            self.abort_startup().await;
            return Err(e);
        }

        self.core.mark_running();
        info!(workers = self.core.cluster_size(), "worker processes ready");
        Ok(())
    }

    async fn start_process(&mut self, batch: Batch) -> Result<(), ClusterError> {
        self.core.dispatch(&mut self.senders, batch).await.map(|_| ())
    }

    #[instrument(name = "process_cluster_drain", skip(self))]
    async fn awaiting_completion_processes(&mut self) -> Result<ClusterReport, ClusterError> {
        if let Some(report) = self.core.cached_report() {
            return Ok(report);
        }
        self.core.ensure_running()?;

        self.core.broadcast_shutdown(&mut self.senders).await;
        // closing stdin lets a worker that missed the sentinel see EOF
        self.senders.clear();

        let mut reports = Vec::with_capacity(self.workers.len());
        for worker in self.workers.drain(..) {
            reports.push(collect(worker).await);
        }
        Ok(self.core.finish(reports))
    }
}
