//! Cluster factory
//!
//! Everything is validated before any worker exists: an unknown strategy, a
//! zero-sized pool or a process cluster without a worker command never
//! spawns anything.

use contracts::ClusterImplementation;
use tracing::debug;

use crate::backend::BackendTaskFactory;
use crate::cluster::{Cluster, ProcessCluster, TaskCluster, ThreadCluster};
use crate::dispatch::ClusterOptions;
use crate::error::ClusterError;

/// Build the dispatcher for `implementation`.
///
/// `cluster_size` must be positive; the variant constructor rejects 0.
pub fn create<F: BackendTaskFactory>(
    backend: F,
    cluster_size: usize,
    implementation: ClusterImplementation,
    options: ClusterOptions,
) -> Result<Cluster<F>, ClusterError> {
    debug!(%implementation, cluster_size, "creating cluster");
    let cluster = match implementation {
        ClusterImplementation::Multiprocessing => {
            Cluster::Process(ProcessCluster::new(backend, cluster_size, options)?)
        }
        ClusterImplementation::Threading => {
            Cluster::Thread(ThreadCluster::new(backend, cluster_size, options)?)
        }
        ClusterImplementation::Asyncio => {
            Cluster::Task(TaskCluster::new(backend, cluster_size, options)?)
        }
    };
    Ok(cluster)
}

/// Like [`create`], taking the strategy as free text.
pub fn create_from_tag<F: BackendTaskFactory>(
    backend: F,
    cluster_size: usize,
    tag: &str,
    options: ClusterOptions,
) -> Result<Cluster<F>, ClusterError> {
    let implementation = tag
        .parse::<ClusterImplementation>()
        .map_err(|e| ClusterError::invalid_config(e.to_string()))?;
    create(backend, cluster_size, implementation, options)
}
