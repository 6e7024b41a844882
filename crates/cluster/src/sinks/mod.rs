//! Sink implementations
//!
//! Contains LogSink, FileSink and MemorySink, plus the factory that picks one
//! from a [`SinkConfig`].

mod file;
mod log;
mod memory;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::memory::{MemorySink, MemoryStore};

use contracts::{ContractError, RecordSink, SinkConfig, SinkType, UserRecord, WorkerId};

use crate::backend::SinkFactory;

/// Any of the stock sinks
pub enum AnySink {
    Log(LogSink),
    File(FileSink),
    Memory(MemorySink),
}

impl RecordSink for AnySink {
    fn name(&self) -> &str {
        match self {
            Self::Log(s) => s.name(),
            Self::File(s) => s.name(),
            Self::Memory(s) => s.name(),
        }
    }

    async fn insert_one(&mut self, record: &UserRecord) -> Result<(), ContractError> {
        match self {
            Self::Log(s) => s.insert_one(record).await,
            Self::File(s) => s.insert_one(record).await,
            Self::Memory(s) => s.insert_one(record).await,
        }
    }

    async fn insert_many(&mut self, records: &[UserRecord]) -> Result<(), ContractError> {
        match self {
            Self::Log(s) => s.insert_many(records).await,
            Self::File(s) => s.insert_many(records).await,
            Self::Memory(s) => s.insert_many(records).await,
        }
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        match self {
            Self::Log(s) => s.close().await,
            Self::File(s) => s.close().await,
            Self::Memory(s) => s.close().await,
        }
    }
}

/// Opens the sink described by a [`SinkConfig`] for each worker.
///
/// Memory sinks of one factory all share the same [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct StockSinkFactory {
    config: SinkConfig,
    memory: MemoryStore,
}

impl StockSinkFactory {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            config,
            memory: MemoryStore::default(),
        }
    }

    pub fn with_memory_store(mut self, store: MemoryStore) -> Self {
        self.memory = store;
        self
    }

    pub fn memory_store(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }
}

impl SinkFactory for StockSinkFactory {
    type Sink = AnySink;

    async fn open(&self, worker: WorkerId) -> Result<AnySink, ContractError> {
        let name = self.config.name.clone();
        let sink = match self.config.sink_type {
            SinkType::Log => AnySink::Log(LogSink::new(name, worker)),
            SinkType::File => {
                let file_config = FileSinkConfig::from_params(&self.config.params)?;
                AnySink::File(FileSink::open(name, worker, &file_config).await?)
            }
            SinkType::Memory => AnySink::Memory(MemorySink::new(name, self.memory.clone())),
        };
        Ok(sink)
    }
}
