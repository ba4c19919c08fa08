//! SQLite implementation of the AuditSink.
//!
//! The table is insert-only: this module issues no UPDATE or DELETE, and
//! triggers in the schema abort any that another client attempts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::adapters::sqlite::{create_pool, Migrator};
use crate::domain::errors::AuditWriteError;
use crate::domain::models::{OverrideRecord, RunStatus};
use crate::domain::ports::AuditSink;

pub struct SqliteAuditSink {
    database_url: Option<String>,
    pool: OnceCell<SqlitePool>,
}

impl SqliteAuditSink {
    /// Wrap a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            database_url: None,
            pool: OnceCell::new_with(Some(pool)),
        }
    }

    /// Defer connecting and migrating until the first read or append, so a
    /// run that never overrides does not depend on the database.
    pub fn connect_lazy(database_url: impl Into<String>) -> Self {
        Self {
            database_url: Some(database_url.into()),
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&SqlitePool, AuditWriteError> {
        self.pool
            .get_or_try_init(|| async {
                let url = self.database_url.as_deref().ok_or_else(|| {
                    AuditWriteError::Database("no database URL configured".to_string())
                })?;
                debug!(url, "Opening audit database");
                let pool = create_pool(url, None)
                    .await
                    .map_err(|e| AuditWriteError::Database(e.to_string()))?;
                Migrator::new(pool.clone())
                    .run_embedded_migrations()
                    .await
                    .map_err(|e| AuditWriteError::Database(e.to_string()))?;
                Ok::<_, AuditWriteError>(pool)
            })
            .await
    }

    /// All recorded overrides, oldest first.
    pub async fn list(&self) -> Result<Vec<OverrideRecord>, AuditWriteError> {
        let rows: Vec<OverrideRow> = sqlx::query_as(
            "SELECT ts, status, line_pct, branch_pct, lines_min, branches_min, override_reason,
                    run_id, git_ref, solution, configuration
             FROM coverage_overrides ORDER BY ts ASC, rowid ASC",
        )
        .fetch_all(self.pool().await?)
        .await?;

        rows.into_iter().map(OverrideRecord::try_from).collect()
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn append(&self, record: &OverrideRecord) -> Result<(), AuditWriteError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO coverage_overrides (id, ts, status, line_pct, branch_pct, lines_min, branches_min,
                   override_reason, run_id, git_ref, solution, configuration)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(id.to_string())
        .bind(record.ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .bind(record.status.as_str())
        .bind(record.line_pct)
        .bind(record.branch_pct)
        .bind(record.lines_min)
        .bind(record.branches_min)
        .bind(&record.override_reason)
        .bind(&record.run_id)
        .bind(&record.git_ref)
        .bind(&record.solution)
        .bind(&record.configuration)
        .execute(self.pool().await?)
        .await?;

        info!(%id, run_id = ?record.run_id, "Override recorded in audit database");
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct OverrideRow {
    ts: String,
    status: String,
    line_pct: f64,
    branch_pct: f64,
    lines_min: Option<f64>,
    branches_min: Option<f64>,
    override_reason: String,
    run_id: Option<String>,
    git_ref: Option<String>,
    solution: Option<String>,
    configuration: Option<String>,
}

impl TryFrom<OverrideRow> for OverrideRecord {
    type Error = AuditWriteError;

    fn try_from(row: OverrideRow) -> Result<Self, Self::Error> {
        let ts = DateTime::parse_from_rfc3339(&row.ts)
            .map_err(|e| AuditWriteError::Database(format!("invalid ts '{}': {e}", row.ts)))?
            .with_timezone(&Utc);
        let status = RunStatus::from_str(&row.status)
            .ok_or_else(|| AuditWriteError::Database(format!("invalid status '{}'", row.status)))?;

        Ok(Self {
            ts,
            status,
            line_pct: row.line_pct,
            branch_pct: row.branch_pct,
            lines_min: row.lines_min,
            branches_min: row.branches_min,
            override_reason: row.override_reason,
            run_id: row.run_id,
            git_ref: row.git_ref,
            solution: row.solution,
            configuration: row.configuration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_test_pool, Migrator};
    use crate::domain::models::{AggregateSnapshot, RunMetadata, ThresholdConfig};

    async fn setup() -> (SqliteAuditSink, SqlitePool) {
        let pool = create_test_pool().await.unwrap();
        Migrator::new(pool.clone())
            .run_embedded_migrations()
            .await
            .unwrap();
        (SqliteAuditSink::new(pool.clone()), pool)
    }

    fn record(reason: &str) -> OverrideRecord {
        OverrideRecord::new(
            reason,
            &AggregateSnapshot::from_counts(172, 208, 86, 104),
            &ThresholdConfig::new(Some(90.0), None).unwrap(),
            &RunMetadata {
                run_id: Some("4711".to_string()),
                git_ref: Some("refs/heads/main".to_string()),
                ..RunMetadata::default()
            },
        )
    }

    #[tokio::test]
    async fn test_append_and_list() {
        let (sink, _pool) = setup().await;
        let original = record("approved by release manager");

        sink.append(&original).await.unwrap();
        sink.append(&record("second")).await.unwrap();

        let records = sink.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], original);
        assert_eq!(records[0].branches_min, None);
        assert_eq!(records[0].git_ref.as_deref(), Some("refs/heads/main"));
    }

    #[tokio::test]
    async fn test_rows_cannot_be_changed() {
        let (sink, pool) = setup().await;
        sink.append(&record("approved")).await.unwrap();

        let update = sqlx::query("UPDATE coverage_overrides SET override_reason = 'edited'")
            .execute(&pool)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM coverage_overrides").execute(&pool).await;
        assert!(delete.is_err());

        assert_eq!(sink.list().await.unwrap()[0].override_reason, "approved");
    }

    #[tokio::test]
    async fn test_lazy_sink_connects_on_first_append() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("audit/overrides.db");
        let sink = SqliteAuditSink::connect_lazy(format!("sqlite:{}", db_path.display()));
        assert!(!db_path.exists());

        sink.append(&record("approved")).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(sink.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lazy_sink_reports_unreachable_database_on_append() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let sink =
            SqliteAuditSink::connect_lazy(format!("sqlite:{}", blocker.join("audit.db").display()));

        assert!(matches!(
            sink.append(&record("approved")).await,
            Err(AuditWriteError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_reason_rejected_by_schema() {
        let (sink, _pool) = setup().await;
        let mut blank = record("x");
        blank.override_reason = "   ".to_string();
        assert!(matches!(
            sink.append(&blank).await,
            Err(AuditWriteError::Database(_))
        ));
    }
}
