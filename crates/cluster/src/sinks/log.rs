//! LogSink - logs insert summaries via tracing

use contracts::{ContractError, RecordSink, UserRecord, WorkerId};
use tracing::{debug, info, instrument};

/// Sink that only logs what it would have inserted
pub struct LogSink {
    name: String,
    worker: WorkerId,
    inserted: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>, worker: WorkerId) -> Self {
        Self {
            name: name.into(),
            worker,
            inserted: 0,
        }
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }
}

impl RecordSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&mut self, record: &UserRecord) -> Result<(), ContractError> {
        debug!(sink = %self.name, worker = %self.worker, username = %record.username, "insert");
        self.inserted += 1;
        Ok(())
    }

    #[instrument(
        name = "log_sink_insert_many",
        skip(self, records),
        fields(sink = %self.name, worker = %self.worker, records = records.len())
    )]
    async fn insert_many(&mut self, records: &[UserRecord]) -> Result<(), ContractError> {
        info!(
            first = records.first().map(|r| r.username.as_str()),
            last = records.last().map(|r| r.username.as_str()),
            "batch received"
        );
        self.inserted += records.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, worker = %self.worker, inserted = self.inserted, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_counts() {
        let mut sink = LogSink::new("users", WorkerId(0));
        sink.insert_one(&UserRecord::new("a", "a@x", 1)).await.unwrap();
        sink.insert_many(&[UserRecord::new("b", "b@x", 2), UserRecord::new("c", "c@x", 3)])
            .await
            .unwrap();
        sink.close().await.unwrap();
        assert_eq!(sink.inserted(), 3);
    }
}
