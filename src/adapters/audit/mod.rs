//! Audit sink adapters.

pub mod jsonl;
pub mod memory;
pub mod null;

pub use jsonl::JsonlAuditSink;
pub use memory::MemoryAuditSink;
pub use null::NullAuditSink;

use std::sync::Arc;
use tracing::debug;

use crate::adapters::sqlite::SqliteAuditSink;
use crate::domain::models::{AuditConfig, AuditSinkKind};
use crate::domain::ports::AuditSink;

/// Build the sink selected by configuration.
///
/// No sink touches its backing store here. The `SQLite` sink connects on
/// its first append, so a run that is never overridden does not need the
/// database to be reachable.
pub fn build_audit_sink(config: &AuditConfig) -> Arc<dyn AuditSink> {
    debug!(sink = ?config.sink, "Building audit sink");
    match config.sink {
        AuditSinkKind::Jsonl => Arc::new(JsonlAuditSink::new(&config.path)),
        AuditSinkKind::Sqlite => Arc::new(SqliteAuditSink::connect_lazy(&config.database_url)),
        AuditSinkKind::None => Arc::new(NullAuditSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::AuditWriteError;
    use crate::domain::models::{AggregateSnapshot, OverrideRecord, RunMetadata, ThresholdConfig};
    use tempfile::TempDir;

    fn record() -> OverrideRecord {
        OverrideRecord::new(
            "approved",
            &AggregateSnapshot::from_counts(1, 2, 0, 0),
            &ThresholdConfig::new(Some(90.0), None).unwrap(),
            &RunMetadata::default(),
        )
    }

    #[tokio::test]
    async fn test_null_sink_refuses() {
        let sink = build_audit_sink(&AuditConfig {
            sink: AuditSinkKind::None,
            ..AuditConfig::default()
        });
        assert!(matches!(
            sink.append(&record()).await,
            Err(AuditWriteError::Disabled)
        ));
    }

    #[tokio::test]
    async fn test_jsonl_sink_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("audit/coverage-override.jsonl");
        let sink = build_audit_sink(&AuditConfig {
            sink: AuditSinkKind::Jsonl,
            path: path.clone(),
            ..AuditConfig::default()
        });

        sink.append(&record()).await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_sink_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", temp_dir.path().join("db/audit.db").display());
        let sink = build_audit_sink(&AuditConfig {
            sink: AuditSinkKind::Sqlite,
            database_url: url,
            ..AuditConfig::default()
        });

        sink.append(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_sink_builds_without_reachable_database() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let sink = build_audit_sink(&AuditConfig {
            sink: AuditSinkKind::Sqlite,
            database_url: format!("sqlite:{}", blocker.join("audit.db").display()),
            ..AuditConfig::default()
        });

        assert!(matches!(
            sink.append(&record()).await,
            Err(AuditWriteError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_sink_records_and_fails() {
        let sink = MemoryAuditSink::new();
        sink.append(&record()).await.unwrap();
        assert_eq!(sink.records().await.len(), 1);

        let failing = MemoryAuditSink::failing();
        assert!(failing.append(&record()).await.is_err());
        assert!(failing.records().await.is_empty());
    }
}
