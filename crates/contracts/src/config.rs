//! MigrationConfig - Config Loader output
//!
//! Describes one migration run: pool shape, source pagination, sink routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ContractError;

/// Default number of records fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 8000;

/// Default number of workers in the pool.
pub const DEFAULT_CLUSTER_SIZE: usize = 90;

/// Complete migration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Worker pool settings
    pub cluster: ClusterConfig,

    /// Where records are read from
    pub source: SourceConfig,

    /// Where records are written to
    pub sink: SinkConfig,
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Number of workers (must be >= 1)
    #[serde(default = "default_cluster_size")]
    pub size: usize,

    /// Execution strategy backing each worker
    #[serde(default)]
    pub implementation: ClusterImplementation,

    /// Upper bound on worker startup (None = wait indefinitely)
    #[serde(default)]
    pub startup_timeout_secs: Option<u64>,
}

fn default_cluster_size() -> usize {
    DEFAULT_CLUSTER_SIZE
}

/// Source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// JSON-lines file holding one user document per line
    pub path: PathBuf,

    /// Records per page (must be >= 1)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Expected total, used for progress display only (None = count the source)
    #[serde(default)]
    pub total_records: Option<u64>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name (used in logs and output file names)
    pub name: String,

    /// Sink kind
    pub sink_type: SinkType,

    /// How a worker hands a batch to its sink
    #[serde(default)]
    pub insert_mode: InsertMode,

    /// Sink specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Supported sink kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Log batch summaries through tracing
    Log,
    /// Append JSON lines, one file per worker
    File,
    /// Keep records in process memory
    Memory,
}

/// Insert semantics used by the stock backend task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// One insert per record
    Single,
    /// One insert per batch
    #[default]
    Bulk,
}

/// Closed set of worker execution strategies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterImplementation {
    /// One OS process per worker, batches serialized over a pipe
    Multiprocessing,
    /// One OS thread per worker, batches moved through a thread-safe queue
    Threading,
    /// One cooperative task per worker on the caller's runtime
    #[default]
    Asyncio,
}

impl ClusterImplementation {
    /// All strategies, in benchmark order
    pub const ALL: [ClusterImplementation; 3] = [
        ClusterImplementation::Asyncio,
        ClusterImplementation::Threading,
        ClusterImplementation::Multiprocessing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Multiprocessing => "multiprocessing",
            Self::Threading => "threading",
            Self::Asyncio => "asyncio",
        }
    }
}

impl fmt::Display for ClusterImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterImplementation {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "multiprocessing" => Ok(Self::Multiprocessing),
            "threading" => Ok(Self::Threading),
            "asyncio" => Ok(Self::Asyncio),
            other => Err(ContractError::config_validation(
                "cluster.implementation",
                format!(
                    "implementation '{other}' not supported, use one of: multiprocessing, threading, asyncio"
                ),
            )),
        }
    }
}
