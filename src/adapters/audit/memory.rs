//! In-memory audit sink for tests and dry runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::errors::AuditWriteError;
use crate::domain::models::OverrideRecord;
use crate::domain::ports::AuditSink;

#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    records: Arc<RwLock<Vec<OverrideRecord>>>,
    fail: bool,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every append.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn records(&self) -> Vec<OverrideRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: &OverrideRecord) -> Result<(), AuditWriteError> {
        if self.fail {
            return Err(AuditWriteError::Rejected(
                "memory sink configured to fail".to_string(),
            ));
        }
        self.records.write().await.push(record.clone());
        Ok(())
    }
}
