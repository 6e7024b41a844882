//! Cluster dispatchers
//!
//! Three independent implementations of one contract, picked at construction
//! time. All three assign batch `i` to worker `i mod N`, deliver exactly one
//! sentinel per worker on drain, and never report a per-batch failure back to
//! the producer.

mod process;
mod task;
mod thread;

pub use self::process::ProcessCluster;
pub use self::task::TaskCluster;
pub use self::thread::ThreadCluster;

use contracts::{Batch, ClusterImplementation};

use crate::backend::BackendTaskFactory;
use crate::error::ClusterError;
use crate::progress::Progress;
use crate::report::ClusterReport;

/// Worker pool contract: initialize, dispatch, drain.
///
/// Meant for a single producer: `start_process` takes `&mut self`. The
/// process and thread pools implement the `Send` form [`ClusterMigration`];
/// [`TaskCluster`] and [`Cluster`] only the local form.
#[trait_variant::make(ClusterMigration: Send)]
pub trait LocalClusterMigration {
    fn implementation(&self) -> ClusterImplementation;

    fn cluster_size(&self) -> usize;

    /// Records and batches submitted so far
    fn progress(&self) -> Progress;

    /// Start every worker and wait until all of them can receive.
    ///
    /// Any worker failing to start is fatal: the ones already running are
    /// shut down and the cluster cannot be used afterwards.
    async fn initialize_processes(&mut self) -> Result<(), ClusterError>;

    /// Hand `batch` to the next worker in rotation.
    ///
    /// Only lifecycle misuse is an error; a dead worker's batch is counted as
    /// lost and dispatch carries on.
    async fn start_process(&mut self, batch: Batch) -> Result<(), ClusterError>;

    /// Send the sentinel to every worker and wait for all of them to stop.
    ///
    /// Calling it again after a drain returns the same report.
    async fn awaiting_completion_processes(&mut self) -> Result<ClusterReport, ClusterError>;
}

/// A dispatcher of any of the three kinds.
///
/// Not `Send`: the cooperative variant keeps its workers on the producer's
/// thread, so the enum is driven from the task that feeds it.
pub enum Cluster<F> {
    Process(ProcessCluster<F>),
    Thread(ThreadCluster<F>),
    Task(TaskCluster<F>),
}

impl<F: BackendTaskFactory> LocalClusterMigration for Cluster<F> {
    fn implementation(&self) -> ClusterImplementation {
        match self {
            Self::Process(c) => LocalClusterMigration::implementation(c),
            Self::Thread(c) => LocalClusterMigration::implementation(c),
            Self::Task(c) => LocalClusterMigration::implementation(c),
        }
    }

    fn cluster_size(&self) -> usize {
        match self {
            Self::Process(c) => LocalClusterMigration::cluster_size(c),
            Self::Thread(c) => LocalClusterMigration::cluster_size(c),
            Self::Task(c) => LocalClusterMigration::cluster_size(c),
        }
    }

    fn progress(&self) -> Progress {
        match self {
            Self::Process(c) => LocalClusterMigration::progress(c),
            Self::Thread(c) => LocalClusterMigration::progress(c),
            Self::Task(c) => LocalClusterMigration::progress(c),
        }
    }

    async fn initialize_processes(&mut self) -> Result<(), ClusterError> {
        match self {
            Self::Process(c) => LocalClusterMigration::initialize_processes(c).await,
            Self::Thread(c) => LocalClusterMigration::initialize_processes(c).await,
            Self::Task(c) => LocalClusterMigration::initialize_processes(c).await,
        }
    }

    async fn start_process(&mut self, batch: Batch) -> Result<(), ClusterError> {
        match self {
            Self::Process(c) => LocalClusterMigration::start_process(c, batch).await,
            Self::Thread(c) => LocalClusterMigration::start_process(c, batch).await,
            Self::Task(c) => LocalClusterMigration::start_process(c, batch).await,
        }
    }

    async fn awaiting_completion_processes(&mut self) -> Result<ClusterReport, ClusterError> {
        match self {
            Self::Process(c) => LocalClusterMigration::awaiting_completion_processes(c).await,
            Self::Thread(c) => LocalClusterMigration::awaiting_completion_processes(c).await,
            Self::Task(c) => LocalClusterMigration::awaiting_completion_processes(c).await,
        }
    }
}
