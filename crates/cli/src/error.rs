//! Error types for CLI operations.

use std::path::{Path, PathBuf};

use cluster::ClusterError;
use contracts::ContractError;
use ingestion::IngestionError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Configuration parsing or validation error
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// Source could not be opened or read
    #[error("Source error: {0}")]
    Source(#[from] IngestionError),

    /// Cluster creation, startup or lifecycle error
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.to_path_buf(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

