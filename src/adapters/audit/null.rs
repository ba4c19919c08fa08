use async_trait::async_trait;

use crate::domain::errors::AuditWriteError;
use crate::domain::models::OverrideRecord;
use crate::domain::ports::AuditSink;

/// Sink for `audit.sink: none`. Refuses every record so an override can
/// never be accepted without being written somewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn append(&self, _record: &OverrideRecord) -> Result<(), AuditWriteError> {
        Err(AuditWriteError::Disabled)
    }
}
