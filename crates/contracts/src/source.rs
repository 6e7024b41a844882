//! RecordSource trait - document store read interface

use crate::{ContractError, UserRecord};

/// Paginated record source.
///
/// Reads are restartable from any offset. The end of the stream is signalled by
/// an absent (or empty) page, never by a sentinel value.
#[trait_variant::make(RecordSource: Send)]
pub trait LocalRecordSource {
    /// Fetch up to `limit` records starting at `offset`.
    ///
    /// Returns `None` once `offset` is past the last record.
    async fn fetch_page(
        &mut self,
        offset: u64,
        limit: usize,
    ) -> Result<Option<Vec<UserRecord>>, ContractError>;

    /// Total number of records currently held by the source.
    async fn count(&mut self) -> Result<u64, ContractError>;
}
