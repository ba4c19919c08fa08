//! Append-only JSON lines override log.
//!
//! Each record is serialized to one line and written with a single
//! `write_all` on a file opened in append mode, then synced to disk before
//! `append` returns. Concurrent processes appending to the same file can
//! therefore never interleave partial records.

use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::errors::AuditWriteError;
use crate::domain::models::OverrideRecord;
use crate::domain::ports::AuditSink;

#[derive(Clone)]
pub struct JsonlAuditSink {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn append_line(path: &Path, line: &[u8]) -> Result<(), AuditWriteError> {
    let io_error = |source| AuditWriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_error)?;
    file.write_all(line).map_err(io_error)?;
    file.sync_data().map_err(io_error)
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, record: &OverrideRecord) -> Result<(), AuditWriteError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let path = self.path().to_path_buf();
        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| AuditWriteError::Worker(e.to_string()))??;

        info!(path = %self.path().display(), run_id = ?record.run_id, "Override recorded in audit log");
        Ok(())
    }
}
