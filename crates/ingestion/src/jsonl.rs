//! JSON-lines file source
//!
//! Each non-blank line holds one user document. Offsets count documents, not
//! lines, so blank lines never shift pagination.

use std::path::{Path, PathBuf};

use contracts::{ContractError, RecordSource, UserRecord};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, instrument};

use crate::error::{IngestionError, Result};

/// Paginated reader over a JSON-lines export of the document store.
pub struct JsonLinesSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    /// Offset of the next document `lines` will yield
    cursor: u64,
    /// Physical line number, for error reporting
    line_no: u64,
}

impl JsonLinesSource {
    /// Open the file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lines = Self::open_lines(&path).await?;
        Ok(Self {
            path,
            lines,
            cursor: 0,
            line_no: 0,
        })
    }

    /// Path backing this source
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_lines(path: &Path) -> Result<Lines<BufReader<File>>> {
        let file = File::open(path).await.map_err(|source| IngestionError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(BufReader::new(file).lines())
    }

    /// Rewind to the start of the file.
    async fn rewind(&mut self) -> std::result::Result<(), ContractError> {
        self.lines = Self::open_lines(&self.path)
            .await
            .map_err(|e| ContractError::source_read(0, e.to_string()))?;
        self.cursor = 0;
        self.line_no = 0;
        Ok(())
    }

    /// Next non-blank line, decoded.
    async fn next_record(&mut self) -> std::result::Result<Option<UserRecord>, ContractError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| ContractError::source_read(self.cursor, e.to_string()))?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let record = serde_json::from_str(trimmed).map_err(|e| {
                ContractError::RecordDecode {
                    line: self.line_no,
                    message: e.to_string(),
                }
            })?;
            self.cursor += 1;
            return Ok(Some(record));
        }
    }
}

impl RecordSource for JsonLinesSource {
    #[instrument(
        name = "jsonl_source_fetch_page",
        skip(self),
        fields(path = %self.path.display())
    )]
    async fn fetch_page(
        &mut self,
        offset: u64,
        limit: usize,
    ) -> std::result::Result<Option<Vec<UserRecord>>, ContractError> {
        if offset < self.cursor {
            debug!(offset, cursor = self.cursor, "rewinding source");
            self.rewind().await?;
        }

        while self.cursor < offset {
            if self.next_record().await?.is_none() {
                return Ok(None);
            }
        }

        let mut page = Vec::with_capacity(limit.min(4096));
        while page.len() < limit {
            match self.next_record().await? {
                Some(record) => page.push(record),
                None => break,
            }
        }

        if page.is_empty() {
            Ok(None)
        } else {
            Ok(Some(page))
        }
    }

    async fn count(&mut self) -> std::result::Result<u64, ContractError> {
        let mut lines = Self::open_lines(&self.path)
            .await
            .map_err(|e| ContractError::source_read(0, e.to_string()))?;
        let mut total = 0u64;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ContractError::source_read(total, e.to_string()))?
        {
            if !line.trim().is_empty() {
                total += 1;
            }
        }
        Ok(total)
    }
}
