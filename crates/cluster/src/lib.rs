//! # Cluster
//!
//! Worker-pool dispatcher for the user migration.
//!
//! A [`Cluster`] owns a fixed pool of workers (processes, threads or
//! cooperative tasks), each bound to one worker channel and one backend task
//! for its whole lifetime. The producer hands it batches; it assigns them
//! round-robin, reports progress, and on drain sends every worker exactly one
//! shutdown sentinel before waiting for all of them.
//!
//! ```ignore
//! let backend = InsertTaskFactory::new(StockSinkFactory::new(config.sink), InsertMode::Bulk);
//! let mut cluster = cluster::create(backend, 4, ClusterImplementation::Threading, options)?;
//! cluster.initialize_processes().await?;
//! while let Some(batch) = pages.next_page().await? {
//!     cluster.start_process(batch).await?;
//! }
//! let report = cluster.awaiting_completion_processes().await?;
//! ```

pub mod backend;
pub mod channel;
mod cluster;
mod dispatch;
pub mod error;
mod factory;
pub mod progress;
pub mod report;
pub mod sinks;
pub mod state;
pub mod worker;

#[cfg(test)]
mod testing;

pub use crate::backend::{BackendTaskFactory, InsertTask, InsertTaskFactory, SinkFactory, WorkerCommand};
pub use crate::cluster::{
    Cluster, ClusterMigration, LocalClusterMigration, ProcessCluster, TaskCluster, ThreadCluster,
};
pub use crate::dispatch::ClusterOptions;
pub use crate::error::ClusterError;
pub use crate::factory::{create, create_from_tag};
pub use crate::progress::{NoProgress, Progress, ProgressReporter, TerminalProgress};
pub use crate::report::{ClusterReport, WorkerOutcome, WorkerReport};
pub use crate::sinks::StockSinkFactory;
pub use crate::worker::{serve_worker, serve_worker_on};
