//! Cluster error types

use contracts::{ContractError, WorkerId};
use thiserror::Error;

use crate::state::Lifecycle;

/// Cluster-specific errors
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Rejected before any worker was created
    #[error("invalid cluster configuration: {message}")]
    InvalidConfig { message: String },

    /// The OS refused to create the worker
    #[error("failed to spawn {worker}: {source}")]
    Spawn {
        worker: WorkerId,
        #[source]
        source: std::io::Error,
    },

    /// Worker was created but never confirmed it was ready
    #[error("{worker} failed to start: {message}")]
    WorkerStartup { worker: WorkerId, message: String },

    /// Startup handshake did not finish in time
    #[error("workers not ready after {waited_ms}ms")]
    StartupTimeout { waited_ms: u64 },

    #[error("cluster already initialized")]
    AlreadyInitialized,

    #[error("cluster is not running (state: {state})")]
    NotRunning { state: Lifecycle },

    /// Consumer side of a worker channel is gone
    #[error("channel to {worker} is closed")]
    ChannelClosed { worker: WorkerId },

    /// Byte-stream channel failed mid-frame
    #[error("channel to {worker} failed: {message}")]
    ChannelIo { worker: WorkerId, message: String },

    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClusterError {
    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a worker startup error
    pub fn worker_startup(worker: WorkerId, message: impl Into<String>) -> Self {
        Self::WorkerStartup {
            worker,
            message: message.into(),
        }
    }

    /// Create a channel io error
    pub fn channel_io(worker: WorkerId, message: impl Into<String>) -> Self {
        Self::ChannelIo {
            worker,
            message: message.into(),
        }
    }
}
