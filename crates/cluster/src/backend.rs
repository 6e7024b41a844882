//! Backend tasks and the factories that build one per worker.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use contracts::{
    Batch, BackendTask, BatchReceiver, ContractError, InsertMode, RecordSink, TaskReport, WorkerId,
    WorkerMessage,
};
use tracing::{debug, error, info, instrument, warn};

/// Builds a fresh [`BackendTask`] for every worker.
///
/// Instances are never shared: each worker gets its own task and therefore its
/// own downstream connection.
pub trait BackendTaskFactory: Send + Sync + 'static {
    type Task: BackendTask;

    fn create(&self, worker: WorkerId) -> Self::Task;

    /// How to launch `worker` as a separate OS process.
    ///
    /// `None` means this backend cannot run process-isolated.
    fn worker_command(&self, worker: WorkerId) -> Option<WorkerCommand> {
        let _ = worker;
        None
    }
}

impl<F, T> BackendTaskFactory for F
where
    F: Fn(WorkerId) -> T + Send + Sync + 'static,
    T: BackendTask,
{
    type Task = T;

    fn create(&self, worker: WorkerId) -> T {
        self(worker)
    }
}

/// Program, arguments and environment of a worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Opens one sink connection per worker.
pub trait SinkFactory: Send + Sync + 'static {
    type Sink: RecordSink + Send + 'static;

    fn open(&self, worker: WorkerId)
        -> impl Future<Output = Result<Self::Sink, ContractError>> + Send;
}

/// Stock backend task: drains the channel into a sink.
pub struct InsertTask<F> {
    worker: WorkerId,
    sinks: Arc<F>,
    mode: InsertMode,
}

impl<F: SinkFactory> InsertTask<F> {
    pub fn new(worker: WorkerId, sinks: Arc<F>, mode: InsertMode) -> Self {
        Self {
            worker,
            sinks,
            mode,
        }
    }

    /// Insert one batch. Failures are logged and counted, never returned.
    async fn insert_batch(&self, sink: &mut F::Sink, batch: &Batch, report: &mut TaskReport) {
        match self.mode {
            InsertMode::Bulk => match sink.insert_many(batch.records()).await {
                Ok(()) => report.records_inserted += batch.len() as u64,
                Err(e) => {
                    error!(worker = %self.worker, records = batch.len(), error = %e, "bulk insert failed");
                    report.failed_batches += 1;
                    report.failed_records += batch.len() as u64;
                }
            },
            InsertMode::Single => {
                for (i, record) in batch.records().iter().enumerate() {
                    if let Err(e) = sink.insert_one(record).await {
                        let abandoned = (batch.len() - i) as u64;
                        error!(
                            worker = %self.worker,
                            username = %record.username,
                            abandoned,
                            error = %e,
                            "insert failed, skipping rest of batch"
                        );
                        report.failed_batches += 1;
                        report.failed_records += abandoned;
                        return;
                    }
                    report.records_inserted += 1;
                }
            }
        }
    }
}

impl<F: SinkFactory> BackendTask for InsertTask<F> {
    #[instrument(name = "insert_task", skip_all, fields(worker = %self.worker, mode = ?self.mode))]
    async fn run<R>(self, mut rx: R) -> Result<TaskReport, ContractError>
    where
        R: BatchReceiver + 'static,
    {
        let mut sink = self.sinks.open(self.worker).await?;
        debug!(sink = sink.name(), "sink opened");

        let mut report = TaskReport::default();
        loop {
            match rx.recv().await {
                Ok(WorkerMessage::Batch(batch)) => {
                    report.batches_received += 1;
                    self.insert_batch(&mut sink, &batch, &mut report).await;
                }
                Ok(WorkerMessage::Shutdown) => break,
                Err(e) => {
                    warn!(error = %e, "channel closed without shutdown");
                    break;
                }
            }
        }

        if let Err(e) = sink.close().await {
            error!(sink = sink.name(), error = %e, "close failed");
        }

        info!(
            batches = report.batches_received,
            inserted = report.records_inserted,
            failed_batches = report.failed_batches,
            "worker finished"
        );
        Ok(report)
    }
}

/// Builds an [`InsertTask`] per worker over a shared sink factory.
pub struct InsertTaskFactory<F> {
    sinks: Arc<F>,
    mode: InsertMode,
    command: Option<WorkerCommand>,
}

impl<F: SinkFactory> InsertTaskFactory<F> {
    pub fn new(sinks: F, mode: InsertMode) -> Self {
        Self {
            sinks: Arc::new(sinks),
            mode,
            command: None,
        }
    }

    /// Enable process isolation; `--worker <index>` is appended per worker.
    pub fn with_worker_command(mut self, command: WorkerCommand) -> Self {
        self.command = Some(command);
        self
    }
}

impl<F: SinkFactory> BackendTaskFactory for InsertTaskFactory<F> {
    type Task = InsertTask<F>;

    fn create(&self, worker: WorkerId) -> Self::Task {
        InsertTask::new(worker, Arc::clone(&self.sinks), self.mode)
    }

    fn worker_command(&self, worker: WorkerId) -> Option<WorkerCommand> {
        self.command
            .clone()
            .map(|cmd| cmd.arg("--worker").arg(worker.index().to_string()))
    }
}
