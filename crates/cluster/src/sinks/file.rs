//! FileSink - appends records as JSON lines, one file per worker

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use contracts::{ContractError, RecordSink, UserRecord, WorkerId};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory
    pub dir: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let dir = params
            .get("dir")
            .map(PathBuf::from)
            .ok_or_else(|| ContractError::config_validation("sink.params.dir", "required for file sink"))?;
        Ok(Self { dir })
    }
}

/// Sink writing to `{dir}/{name}-{worker}.jsonl`
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    pub async fn open(
        name: impl Into<String>,
        worker: WorkerId,
        config: &FileSinkConfig,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        fs::create_dir_all(&config.dir)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        let path = Self::path_for(&config.dir, &name, worker);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;
        debug!(sink = %name, path = %path.display(), "file sink opened");

        Ok(Self {
            name,
            path,
            writer: BufWriter::new(file),
        })
    }

    /// File a given worker writes to
    pub fn path_for(dir: &Path, name: &str, worker: WorkerId) -> PathBuf {
        dir.join(format!("{name}-{worker}.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&self, record: &UserRecord, out: &mut Vec<u8>) -> Result<(), ContractError> {
        serde_json::to_writer(&mut *out, record)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        out.push(b'\n');
        Ok(())
    }

    async fn append(&mut self, bytes: &[u8]) -> Result<(), ContractError> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }
}

impl RecordSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&mut self, record: &UserRecord) -> Result<(), ContractError> {
        let mut line = Vec::with_capacity(96);
        self.encode(record, &mut line)?;
        self.append(&line).await
    }

    async fn insert_many(&mut self, records: &[UserRecord]) -> Result<(), ContractError> {
        // encode the whole batch first so a bad record writes nothing
        let mut buf = Vec::with_capacity(records.len() * 96);
        for record in records {
            self.encode(record, &mut buf)?;
        }
        self.append(&buf).await
    }

    #[instrument(name = "file_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }
}
