//! In-memory source, for tests and dry runs.

use contracts::{ContractError, RecordSource, UserRecord};

/// Source backed by a `Vec` of records.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<UserRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<UserRecord>) -> Self {
        Self { records }
    }

    /// Source holding `count` generated users named `u1..=u{count}`.
    pub fn generated(count: usize) -> Self {
        let records = (1..=count)
            .map(|n| UserRecord::new(format!("u{n}"), format!("u{n}@example.com"), 18 + (n % 83) as i32))
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[UserRecord] {
        &self.records
    }
}

impl RecordSource for MemorySource {
    async fn fetch_page(
        &mut self,
        offset: u64,
        limit: usize,
    ) -> Result<Option<Vec<UserRecord>>, ContractError> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        if start >= self.records.len() || limit == 0 {
            return Ok(None);
        }
        let end = start.saturating_add(limit).min(self.records.len());
        Ok(Some(self.records[start..end].to_vec()))
    }

    async fn count(&mut self) -> Result<u64, ContractError> {
        Ok(self.records.len() as u64)
    }
}
