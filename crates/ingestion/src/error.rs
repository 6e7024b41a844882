//! Ingestion error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source file could not be opened
    #[error("failed to open source {path}: {source}")]
    Open {
        /// Source path
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Page size of zero would never advance the stream
    #[error("page size must be >= 1")]
    InvalidPageSize,

    /// Error raised by the underlying source
    #[error(transparent)]
    Source(#[from] ContractError),
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
