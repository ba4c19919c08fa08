//! Audit sink port.

use async_trait::async_trait;

use crate::domain::errors::AuditWriteError;
use crate::domain::models::OverrideRecord;

/// Write-once destination for override audit records.
///
/// Implementations only ever add records. A record must be durable, and
/// written as a single unit, before `append` returns `Ok`.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record to the audit trail.
    async fn append(&self, record: &OverrideRecord) -> Result<(), AuditWriteError>;
}
