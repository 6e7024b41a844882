//! PageStream - driver-side reader turning source pages into batches

use contracts::{Batch, RecordSource};
use metrics::counter;
use tracing::{debug, trace};

use crate::error::{IngestionError, Result};

/// Lazily walks a `RecordSource` page by page.
///
/// Starts at offset 0 and advances by the length of every page it returns.
/// An absent or empty page ends the stream; the stream never yields an empty
/// batch.
pub struct PageStream<S> {
    source: S,
    page_size: usize,
    offset: u64,
    pages_read: u64,
    finished: bool,
}

impl<S: RecordSource> PageStream<S> {
    /// Create a stream starting at offset 0.
    pub fn new(source: S, page_size: usize) -> Result<Self> {
        Self::starting_at(source, page_size, 0)
    }

    /// Create a stream starting at `offset`.
    pub fn starting_at(source: S, page_size: usize, offset: u64) -> Result<Self> {
        if page_size == 0 {
            return Err(IngestionError::InvalidPageSize);
        }
        Ok(Self {
            source,
            page_size,
            offset,
            pages_read: 0,
            finished: false,
        })
    }

    /// Next batch, or `None` at end of stream.
    pub async fn next_page(&mut self) -> Result<Option<Batch>> {
        if self.finished {
            return Ok(None);
        }

        let page = self.source.fetch_page(self.offset, self.page_size).await?;
        match page {
            Some(records) if !records.is_empty() => {
                trace!(offset = self.offset, len = records.len(), "page read");
                self.offset += records.len() as u64;
                self.pages_read += 1;
                counter!("user_migrate_pages_read_total").increment(1);
                Ok(Some(Batch::new(records)))
            }
            _ => {
                debug!(
                    offset = self.offset,
                    pages = self.pages_read,
                    "source exhausted"
                );
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Offset of the next record to read
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Pages yielded so far
    pub fn pages_read(&self) -> u64 {
        self.pages_read
    }
}
