use super::tabular::{decode_records, encode_records};
use crate::error::{MonitorError, Result};
use crate::models::DailyRecord;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Append-only historical ledger. Rows land here only through a daily reset.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
}

impl ArchiveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn has_content(&self) -> Result<bool> {
        match fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len() > 0),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MonitorError::storage(&self.path, e)),
        }
    }

    /// Append rows, writing the header only when the archive is new or empty.
    pub async fn append(&self, records: &[DailyRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let with_header = !self.has_content().await?;
        let bytes = encode_records(&self.path, records, with_header)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MonitorError::storage(parent, e))?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| MonitorError::storage(&self.path, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| MonitorError::storage(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| MonitorError::storage(&self.path, e))?;

        log::info!("Archived {} records to {}", records.len(), self.path.display());
        Ok(())
    }

    /// `None` when no archive has been written yet.
    pub async fn read_all(&self) -> Result<Option<Vec<DailyRecord>>> {
        match fs::read(&self.path).await {
            Ok(bytes) => decode_records(&self.path, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MonitorError::storage(&self.path, e)),
        }
    }
}
