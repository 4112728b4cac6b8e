use securegov_core::audit::AuditEvent;

use super::RepositoryError;
use crate::DbPool;

/// Durable writer for the audit trail.
///
/// Deliberately not an `AuditSink` implementation: that trait is synchronous
/// for in-process fan-out, while this store needs the async pool. Callers
/// record events explicitly and decide how to handle a failed write.
pub struct SqlAuditEventStore {
    pool: DbPool,
}

impl SqlAuditEventStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|e| RepositoryError::Decode(format!("encode audit metadata: {e}")))?;

        sqlx::query(
            "INSERT INTO audit_events
                (id, request_id, correlation_id, event_type, category, actor, outcome,
                 metadata_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.request_id.as_ref().map(|id| id.0.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(event.category.as_str())
        .bind(&event.actor)
        .bind(event.outcome.as_str())
        .bind(&metadata)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
