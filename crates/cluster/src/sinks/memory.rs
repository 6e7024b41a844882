//! MemorySink - keeps inserted records in a shared vector

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{ContractError, RecordSink, UserRecord};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<UserRecord>,
    /// Present when usernames carry a unique constraint
    usernames: Option<HashSet<String>>,
}

/// Shared in-memory table, cloned into every worker's sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Arc<Mutex<Table>>,
}

impl MemoryStore {
    /// Store that rejects a second row with an existing username.
    pub fn unique_usernames() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                rows: Vec::new(),
                usernames: Some(HashSet::new()),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of every row, in insertion order
    pub fn records(&self) -> Vec<UserRecord> {
        self.lock().rows.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct MemorySink {
    name: String,
    store: MemoryStore,
}

impl MemorySink {
    pub fn new(name: impl Into<String>, store: MemoryStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    fn duplicate(&self, username: &str) -> ContractError {
        ContractError::sink_write(
            &self.name,
            format!("duplicate key: username '{username}' already exists"),
        )
    }
}

impl RecordSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&mut self, record: &UserRecord) -> Result<(), ContractError> {
        let mut table = self.store.lock();
        if let Some(names) = table.usernames.as_mut() {
            if !names.insert(record.username.clone()) {
                return Err(self.duplicate(&record.username));
            }
        }
        table.rows.push(record.clone());
        Ok(())
    }

    /// All or nothing, like a bulk insert inside a transaction.
    async fn insert_many(&mut self, records: &[UserRecord]) -> Result<(), ContractError> {
        let mut table = self.store.lock();
        if let Some(names) = table.usernames.as_mut() {
            let mut seen = HashSet::with_capacity(records.len());
            for record in records {
                if names.contains(&record.username) || !seen.insert(record.username.as_str()) {
                    return Err(self.duplicate(&record.username));
                }
            }
            names.extend(records.iter().map(|r| r.username.clone()));
        }
        table.rows.extend_from_slice(records);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
