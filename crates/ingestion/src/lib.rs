//! # Ingestion
//!
//! Source side of the migration.
//!
//! Responsibilities:
//! - Read user documents from a paginated `RecordSource`
//! - Turn pages into `Batch`es for the cluster dispatcher
//! - Recognize end of stream (absent page), never emitting an empty batch
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{JsonLinesSource, PageStream};
//!
//! let source = JsonLinesSource::open("users.jsonl").await?;
//! let mut pages = PageStream::new(source, 8000)?;
//! while let Some(batch) = pages.next_page().await? {
//!     cluster.start_process(batch).await?;
//! }
//! ```

mod error;
mod jsonl;
mod memory;
mod stream;

pub use contracts::{RecordSource, UserRecord};
pub use error::{IngestionError, Result};
pub use jsonl::JsonLinesSource;
pub use memory::MemorySource;
pub use stream::PageStream;
