use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use securegov_core::domain::disclosure::{ReportStatus, WhistleblowerReport};

use super::{DisclosureRepository, RepositoryError};
use crate::DbPool;

const REPORT_COLUMNS: &str = "id, date, category, description, status, is_anonymous,
        evidence_urls, submitter_name, submitter_email, submitter_phone,
        created_at, updated_at";

pub struct SqlDisclosureRepository {
    pool: DbPool,
}

impl SqlDisclosureRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_report(row: SqliteRow) -> Result<WhistleblowerReport, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_anonymous: i64 =
        row.try_get("is_anonymous").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let evidence_json: String =
        row.try_get("evidence_urls").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let submitter_name: Option<String> =
        row.try_get("submitter_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let submitter_email: Option<String> =
        row.try_get("submitter_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let submitter_phone: Option<String> =
        row.try_get("submitter_phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        RepositoryError::Decode(format!("report {id} has bad date `{date_str}`: {e}"))
    })?;
    let status = ReportStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("report {id} has unknown status `{status_str}`"))
    })?;
    let evidence_urls: Vec<String> = serde_json::from_str(&evidence_json)
        .map_err(|e| RepositoryError::Decode(format!("report {id} evidence column: {e}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(WhistleblowerReport {
        id,
        date,
        category,
        description,
        status,
        is_anonymous: is_anonymous != 0,
        evidence_urls,
        submitter_name,
        submitter_email,
        submitter_phone,
        created_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl DisclosureRepository for SqlDisclosureRepository {
    async fn list(&self) -> Result<Vec<WhistleblowerReport>, RepositoryError> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM whistleblower_reports ORDER BY date DESC, id ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_report).collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<WhistleblowerReport>, RepositoryError> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM whistleblower_reports WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(row_to_report).transpose()
    }

    async fn insert(&self, report: WhistleblowerReport) -> Result<(), RepositoryError> {
        let evidence_json = serde_json::to_string(&report.evidence_urls)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(
            "INSERT INTO whistleblower_reports
                 (id, date, category, description, status, is_anonymous, evidence_urls,
                  submitter_name, submitter_email, submitter_phone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&report.id)
        .bind(report.date.format("%Y-%m-%d").to_string())
        .bind(&report.category)
        .bind(&report.description)
        .bind(report.status.as_str())
        .bind(i64::from(report.is_anonymous))
        .bind(&evidence_json)
        .bind(report.submitter_name.as_deref())
        .bind(report.submitter_email.as_deref())
        .bind(report.submitter_phone.as_deref())
        .bind(report.created_at.to_rfc3339())
        .bind(report.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> Result<Option<WhistleblowerReport>, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE whistleblower_reports SET status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use securegov_core::domain::disclosure::{ReportStatus, WhistleblowerReport};

    use super::SqlDisclosureRepository;
    use crate::repositories::DisclosureRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn anonymous_report(id: &str, date: &str) -> WhistleblowerReport {
        let now = Utc.with_ymd_and_hms(2023, 10, 12, 10, 30, 0).unwrap();
        WhistleblowerReport {
            id: id.to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("valid date"),
            category: "procurement".to_string(),
            description: "Inflated invoices routed through a shell vendor".to_string(),
            status: ReportStatus::Unverified,
            is_anonymous: true,
            evidence_urls: vec!["https://evidence.example/invoice-381.pdf".to_string()],
            submitter_name: None,
            submitter_email: None,
            submitter_phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_anonymous_reports() {
        let pool = setup().await;
        let repo = SqlDisclosureRepository::new(pool);

        repo.insert(anonymous_report("WB-2023-001", "2023-10-12")).await.expect("insert");

        let found =
            repo.find_by_id("WB-2023-001").await.expect("find").expect("report exists");
        assert!(found.is_anonymous);
        assert_eq!(found.status, ReportStatus::Unverified);
        assert_eq!(found.evidence_urls.len(), 1);
        assert!(found.submitter_name.is_none());
    }

    #[tokio::test]
    async fn update_status_returns_the_updated_report() {
        let pool = setup().await;
        let repo = SqlDisclosureRepository::new(pool);
        repo.insert(anonymous_report("WB-2023-002", "2023-10-13")).await.expect("insert");

        let updated = repo
            .update_status("WB-2023-002", ReportStatus::Investigating)
            .await
            .expect("update")
            .expect("report exists");
        assert_eq!(updated.status, ReportStatus::Investigating);
        assert!(updated.updated_at > updated.created_at);
    }

    #[tokio::test]
    async fn update_status_on_missing_report_returns_none() {
        let pool = setup().await;
        let repo = SqlDisclosureRepository::new(pool);

        let missing =
            repo.update_status("WB-0000", ReportStatus::Verified).await.expect("update");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn list_orders_reports_newest_first() {
        let pool = setup().await;
        let repo = SqlDisclosureRepository::new(pool);
        repo.insert(anonymous_report("WB-2023-003", "2023-09-28")).await.expect("insert 1");
        repo.insert(anonymous_report("WB-2023-004", "2023-10-13")).await.expect("insert 2");

        let listed = repo.list().await.expect("list");
        assert_eq!(listed[0].id, "WB-2023-004");
        assert_eq!(listed[1].id, "WB-2023-003");
    }
}
