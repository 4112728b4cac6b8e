use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use securegov_core::approvals::{self, DecisionError, DecisionInput, DecisionOutcome};
use securegov_core::domain::approval::{
    ApprovalRequest, RequestId, RoleApproval, StoredApprovalEntry,
};

use super::{ApprovalRepository, RepositoryError};
use crate::DbPool;

/// Retry budget for the optimistic decision write. Each miss means another
/// writer bumped the row version between our read and our update.
const MAX_DECISION_ATTEMPTS: u32 = 5;

pub struct SqlApprovalRepository {
    pool: DbPool,
}

impl SqlApprovalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn storage_error(operation: &'static str, err: impl std::fmt::Display) -> DecisionError {
    DecisionError::Storage { operation, message: err.to_string() }
}

fn encode_entries(entries: &[RoleApproval]) -> Result<String, serde_json::Error> {
    let stored: Vec<StoredApprovalEntry> =
        entries.iter().map(StoredApprovalEntry::from_role_approval).collect();
    serde_json::to_string(&stored)
}

/// Projects a stored row into the domain shape. The approvals column is
/// normalized into the canonical two-role sequence, and the overall status
/// is re-derived from those entries rather than trusted from the column, so
/// rows written before the role canonicalization still read cleanly.
fn row_to_request(row: &SqliteRow) -> Result<ApprovalRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agency: String =
        row.try_get("agency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let amount_text: String =
        row.try_get("amount_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approvals_json: String =
        row.try_get("approvals").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rejection_reason: Option<String> =
        row.try_get("rejection_reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let version: i64 =
        row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        RepositoryError::Decode(format!("request {id} has bad date `{date_str}`: {e}"))
    })?;
    let amount = Decimal::from_str(&amount_text).map_err(|e| {
        RepositoryError::Decode(format!("request {id} has bad amount `{amount_text}`: {e}"))
    })?;
    let stored: Vec<StoredApprovalEntry> = serde_json::from_str(&approvals_json)
        .map_err(|e| RepositoryError::Decode(format!("request {id} approvals column: {e}")))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    let entries = approvals::normalize_entries(&stored);
    let status = approvals::derive_overall_status(&entries);

    Ok(ApprovalRequest {
        id: RequestId(id),
        description,
        agency,
        date,
        amount,
        status,
        approvals: entries,
        rejection_reason,
        version,
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl ApprovalRepository for SqlApprovalRepository {
    async fn list(&self) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            r#"
            SELECT
                id,
                description,
                agency,
                date,
                CAST(amount AS TEXT) AS amount_text,
                approvals,
                rejection_reason,
                version,
                created_at,
                updated_at
            FROM approval_requests
            ORDER BY date DESC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                description,
                agency,
                date,
                CAST(amount AS TEXT) AS amount_text,
                approvals,
                rejection_reason,
                version,
                created_at,
                updated_at
            FROM approval_requests
            WHERE id = ?
            "#,
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_request(r)?)),
            None => Ok(None),
        }
    }

    async fn apply_decision(
        &self,
        id: &RequestId,
        input: &DecisionInput,
    ) -> Result<DecisionOutcome, DecisionError> {
        for _ in 0..MAX_DECISION_ATTEMPTS {
            let current = self
                .find_by_id(id)
                .await
                .map_err(|err| storage_error("decision read", err))?
                .ok_or_else(|| DecisionError::NotFound { id: id.0.clone() })?;

            let expected_version = current.version;
            let mut outcome = approvals::apply_decision(current, input);
            outcome.request.version = expected_version + 1;
            outcome.request.updated_at = Utc::now();

            let approvals_json = encode_entries(&outcome.request.approvals)
                .map_err(|err| storage_error("decision encode", err))?;

            let updated = sqlx::query(
                r#"
                UPDATE approval_requests
                SET status = ?,
                    approvals = ?,
                    rejection_reason = ?,
                    version = ?,
                    updated_at = ?
                WHERE id = ? AND version = ?
                "#,
            )
            .bind(outcome.request.status.as_str())
            .bind(&approvals_json)
            .bind(&outcome.request.rejection_reason)
            .bind(outcome.request.version)
            .bind(outcome.request.updated_at.to_rfc3339())
            .bind(&id.0)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(|err| storage_error("decision write", err))?;

            if updated.rows_affected() == 1 {
                return Ok(outcome);
            }
            // Lost the race; re-read and re-apply against the fresh row.
        }

        Err(DecisionError::Contention { id: id.0.clone(), attempts: MAX_DECISION_ATTEMPTS })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use securegov_core::approvals::{DecisionError, DecisionInput};
    use securegov_core::domain::approval::{Decision, DecisionStatus, RequestId, SignerRole};

    use super::SqlApprovalRepository;
    use crate::repositories::ApprovalRepository;
    use crate::{connect_with_settings, migrations};

    const PENDING_BOTH: &str = r#"[
        {"role": "Auditor", "status": "pending", "name": "John Adebayo"},
        {"role": "International Organization", "status": "pending", "name": "Lena Virtanen"}
    ]"#;

    const LEGACY_THREE_ROLE: &str = r#"[
        {"role": "Auditor", "status": "approved", "name": "John Adebayo"},
        {"role": "Anti-Corruption", "status": "approved", "name": "Maria Santos"},
        {"role": "AI Verification", "status": "pending", "name": "System"}
    ]"#;

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_request(pool: &sqlx::SqlitePool, id: &str, date: &str, approvals: &str) {
        sqlx::query(
            "INSERT INTO approval_requests
                 (id, description, agency, date, amount, status, approvals,
                  rejection_reason, version, created_at, updated_at)
             VALUES (?, 'Procurement of medical supplies', 'Ministry of Health', ?, 1250000,
                     'pending', ?, NULL, 0, '2023-10-15T08:00:00Z', '2023-10-15T08:00:00Z')",
        )
        .bind(id)
        .bind(date)
        .bind(approvals)
        .execute(pool)
        .await
        .expect("insert approval request");
    }

    fn decide(role: SignerRole, decision: Decision, reason: Option<&str>) -> DecisionInput {
        DecisionInput { role, decision, rejection_reason: reason.map(str::to_string) }
    }

    #[tokio::test]
    async fn list_orders_by_date_desc_then_id_asc() {
        let pool = setup().await;
        insert_request(&pool, "AP-B", "2023-10-14", PENDING_BOTH).await;
        insert_request(&pool, "AP-C", "2023-10-15", PENDING_BOTH).await;
        insert_request(&pool, "AP-A", "2023-10-15", PENDING_BOTH).await;

        let repo = SqlApprovalRepository::new(pool);
        let requests = repo.list().await.expect("list");

        let ids: Vec<&str> = requests.iter().map(|r| r.id.0.as_str()).collect();
        assert_eq!(ids, vec!["AP-A", "AP-C", "AP-B"]);
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown_request() {
        let pool = setup().await;
        let repo = SqlApprovalRepository::new(pool);

        let found =
            repo.find_by_id(&RequestId("AP-MISSING".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn reads_project_legacy_rows_into_the_two_role_shape() {
        let pool = setup().await;
        insert_request(&pool, "AP-7829", "2023-10-15", LEGACY_THREE_ROLE).await;

        let repo = SqlApprovalRepository::new(pool);
        let found = repo
            .find_by_id(&RequestId("AP-7829".to_string()))
            .await
            .expect("find")
            .expect("request exists");

        assert_eq!(found.amount, Decimal::new(1_250_000, 0));
        assert_eq!(found.approvals.len(), 2);
        assert_eq!(found.approvals[0].role, SignerRole::Auditor);
        assert_eq!(found.approvals[1].role, SignerRole::InternationalOrganization);
        // The legacy Anti-Corruption verdict carries into the international
        // slot, and the overall status is derived from the projection, not
        // read from the stale column.
        assert_eq!(found.approvals[1].status, DecisionStatus::Approved);
        assert_eq!(found.approvals[1].name, "International Observer");
        assert_eq!(found.status, DecisionStatus::Approved);
    }

    #[tokio::test]
    async fn decision_persists_and_bumps_the_row_version() {
        let pool = setup().await;
        insert_request(&pool, "AP-6547", "2023-09-22", PENDING_BOTH).await;

        let repo = SqlApprovalRepository::new(pool);
        let outcome = repo
            .apply_decision(
                &RequestId("AP-6547".to_string()),
                &decide(SignerRole::Auditor, Decision::Approved, None),
            )
            .await
            .expect("apply decision");

        assert_eq!(outcome.previous_entry_status, DecisionStatus::Pending);
        assert_eq!(outcome.previous_overall_status, DecisionStatus::Pending);
        assert_eq!(outcome.request.status, DecisionStatus::Pending);
        assert_eq!(outcome.request.version, 1);

        let reread = repo
            .find_by_id(&RequestId("AP-6547".to_string()))
            .await
            .expect("find")
            .expect("request exists");
        assert_eq!(reread.role_status(SignerRole::Auditor), Some(DecisionStatus::Approved));
        assert_eq!(
            reread.role_status(SignerRole::InternationalOrganization),
            Some(DecisionStatus::Pending)
        );
        assert_eq!(reread.version, 1);
    }

    #[tokio::test]
    async fn both_approvals_complete_the_request() {
        let pool = setup().await;
        insert_request(&pool, "AP-4521", "2023-08-30", PENDING_BOTH).await;
        let id = RequestId("AP-4521".to_string());

        let repo = SqlApprovalRepository::new(pool);
        repo.apply_decision(&id, &decide(SignerRole::Auditor, Decision::Approved, None))
            .await
            .expect("auditor decision");
        let outcome = repo
            .apply_decision(
                &id,
                &decide(SignerRole::InternationalOrganization, Decision::Approved, None),
            )
            .await
            .expect("international decision");

        assert_eq!(outcome.previous_overall_status, DecisionStatus::Pending);
        assert_eq!(outcome.request.status, DecisionStatus::Approved);
        assert_eq!(outcome.request.version, 2);
    }

    #[tokio::test]
    async fn concurrent_decisions_for_different_roles_both_land() {
        let pool = setup().await;
        insert_request(&pool, "AP-7831", "2023-10-16", PENDING_BOTH).await;
        let id = RequestId("AP-7831".to_string());

        let auditor_repo = SqlApprovalRepository::new(pool.clone());
        let international_repo = SqlApprovalRepository::new(pool.clone());
        let auditor_id = id.clone();
        let international_id = id.clone();

        // Both writers read the same row version; the loser of the version
        // compare-and-set re-reads and re-applies.
        let auditor = tokio::spawn(async move {
            auditor_repo
                .apply_decision(
                    &auditor_id,
                    &decide(SignerRole::Auditor, Decision::Approved, None),
                )
                .await
        });
        let international = tokio::spawn(async move {
            international_repo
                .apply_decision(
                    &international_id,
                    &decide(SignerRole::InternationalOrganization, Decision::Approved, None),
                )
                .await
        });

        auditor.await.expect("auditor task").expect("auditor decision");
        international.await.expect("international task").expect("international decision");

        let repo = SqlApprovalRepository::new(pool);
        let reread = repo.find_by_id(&id).await.expect("find").expect("request exists");
        assert_eq!(reread.role_status(SignerRole::Auditor), Some(DecisionStatus::Approved));
        assert_eq!(
            reread.role_status(SignerRole::InternationalOrganization),
            Some(DecisionStatus::Approved)
        );
        assert_eq!(reread.status, DecisionStatus::Approved);
        assert_eq!(reread.version, 2, "each landed decision bumps the version once");
    }

    #[tokio::test]
    async fn rejection_reason_survives_a_later_decision_without_one() {
        let pool = setup().await;
        insert_request(&pool, "AP-9823", "2023-10-01", PENDING_BOTH).await;
        let id = RequestId("AP-9823".to_string());

        let repo = SqlApprovalRepository::new(pool);
        repo.apply_decision(
            &id,
            &decide(
                SignerRole::InternationalOrganization,
                Decision::Rejected,
                Some("Duplicate payment detected."),
            ),
        )
        .await
        .expect("rejection");

        let outcome = repo
            .apply_decision(&id, &decide(SignerRole::Auditor, Decision::Approved, None))
            .await
            .expect("later approval");

        assert_eq!(outcome.request.status, DecisionStatus::Rejected);
        assert_eq!(outcome.request.rejection_reason.as_deref(), Some("Duplicate payment detected."));

        let reread = repo.find_by_id(&id).await.expect("find").expect("request exists");
        assert_eq!(reread.rejection_reason.as_deref(), Some("Duplicate payment detected."));
    }

    #[tokio::test]
    async fn decision_on_a_legacy_row_canonicalizes_the_stored_entries() {
        let pool = setup().await;
        insert_request(&pool, "AP-3365", "2023-07-18", LEGACY_THREE_ROLE).await;
        let id = RequestId("AP-3365".to_string());

        let repo = SqlApprovalRepository::new(pool.clone());
        repo.apply_decision(&id, &decide(SignerRole::Auditor, Decision::Approved, None))
            .await
            .expect("decision");

        let stored: String =
            sqlx::query_scalar("SELECT approvals FROM approval_requests WHERE id = ?")
                .bind(&id.0)
                .fetch_one(&pool)
                .await
                .expect("stored approvals");
        assert!(!stored.contains("Anti-Corruption"));
        assert!(!stored.contains("AI Verification"));
        assert!(stored.contains("International Organization"));
    }

    #[tokio::test]
    async fn decision_on_missing_request_is_not_found() {
        let pool = setup().await;
        let repo = SqlApprovalRepository::new(pool);

        let err = repo
            .apply_decision(
                &RequestId("AP-0000".to_string()),
                &decide(SignerRole::Auditor, Decision::Approved, None),
            )
            .await
            .expect_err("should miss");

        assert!(matches!(err, DecisionError::NotFound { ref id } if id == "AP-0000"));
    }
}
