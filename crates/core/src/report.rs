//! In-memory report rows with checkpointing to the persisted report file.

use crate::models::ReportEntry;
use std::io;
use std::path::{Path, PathBuf};
use storage::StorageError;
use tokio::task;
use tracing::info;

#[derive(Debug)]
pub struct ReportStore {
    path: PathBuf,
    pending: Vec<ReportEntry>,
    checkpoint_every: usize,
    persisted: usize,
}

impl ReportStore {
    pub fn new(path: impl Into<PathBuf>, checkpoint_every: usize) -> Self {
        Self {
            path: path.into(),
            pending: Vec::new(),
            checkpoint_every: checkpoint_every.max(1),
            persisted: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, entry: ReportEntry) {
        self.pending.push(entry);
    }

    /// Rows not yet written to the report file.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Rows written to the report file by this store.
    pub fn persisted(&self) -> usize {
        self.persisted
    }

    /// Flushes once the pending rows reach the checkpoint threshold.
    /// Returns whether a flush happened.
    pub async fn maybe_checkpoint(&mut self) -> Result<bool, StorageError> {
        if self.pending.len() < self.checkpoint_every {
            return Ok(false);
        }
        self.flush().await?;
        Ok(true)
    }

    /// Appends pending rows to the report file and clears them.
    ///
    /// The file write runs on the blocking pool. On error the rows stay
    /// pending for the next attempt. With nothing pending the report file is
    /// not touched.
    pub async fn flush(&mut self) -> Result<usize, StorageError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let rows: Vec<_> = self.pending.iter().map(ReportEntry::to_row).collect();
        let path = self.path.clone();
        let written = task::spawn_blocking(move || storage::append_rows(&path, &rows))
            .await
            .map_err(|e| StorageError::Io {
                path: self.path.display().to_string(),
                source: io::Error::new(io::ErrorKind::Other, e.to_string()),
            })??;
        self.pending.clear();
        self.persisted += written;
        info!("Report saved to {} ({} new rows)", self.path.display(), written);
        Ok(written)
    }
}
