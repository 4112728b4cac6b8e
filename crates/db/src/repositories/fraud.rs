use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use securegov_core::domain::fraud::{AlertSeverity, FraudAlert};

use super::{FraudAlertRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFraudAlertRepository {
    pool: DbPool,
}

impl SqlFraudAlertRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_alert(row: SqliteRow) -> Result<FraudAlert, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agency: String =
        row.try_get("agency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let amount_text: String =
        row.try_get("amount_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let risk_score: i64 =
        row.try_get("risk_score").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let severity_str: String =
        row.try_get("severity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let pattern: String =
        row.try_get("pattern").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        RepositoryError::Decode(format!("alert {id} has bad date `{date_str}`: {e}"))
    })?;
    let amount = Decimal::from_str(&amount_text).map_err(|e| {
        RepositoryError::Decode(format!("alert {id} has bad amount `{amount_text}`: {e}"))
    })?;
    let severity = AlertSeverity::parse(&severity_str).ok_or_else(|| {
        RepositoryError::Decode(format!("alert {id} has unknown severity `{severity_str}`"))
    })?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(FraudAlert { id, date, agency, description, amount, risk_score, severity, pattern, created_at })
}

#[async_trait::async_trait]
impl FraudAlertRepository for SqlFraudAlertRepository {
    async fn list(&self) -> Result<Vec<FraudAlert>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                date,
                agency,
                description,
                CAST(amount AS TEXT) AS amount_text,
                risk_score,
                severity,
                pattern,
                created_at
             FROM fraud_alerts
             ORDER BY date DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_alert).collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use securegov_core::domain::fraud::AlertSeverity;

    use super::SqlFraudAlertRepository;
    use crate::repositories::FraudAlertRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_alert(pool: &sqlx::SqlitePool, id: &str, date: &str, severity: &str) {
        sqlx::query(
            "INSERT INTO fraud_alerts
                 (id, date, agency, description, amount, risk_score, severity, pattern, created_at)
             VALUES (?, ?, 'Intelligence Agency', 'Payment to unregistered vendor', 2100000,
                     89, ?, 'shell-company', '2023-10-01T12:00:00Z')",
        )
        .bind(id)
        .bind(date)
        .bind(severity)
        .execute(pool)
        .await
        .expect("insert alert");
    }

    #[tokio::test]
    async fn list_returns_alerts_newest_first() {
        let pool = setup().await;
        insert_alert(&pool, "FA-001", "2023-09-05", "medium").await;
        insert_alert(&pool, "FA-002", "2023-10-01", "high").await;

        let repo = SqlFraudAlertRepository::new(pool);
        let alerts = repo.list().await.expect("list");

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].id, "FA-002");
        assert_eq!(alerts[0].severity, AlertSeverity::High);
        assert_eq!(alerts[0].amount, Decimal::new(2_100_000, 0));
        assert_eq!(alerts[0].risk_score, 89);
        assert_eq!(alerts[1].id, "FA-001");
    }

    #[tokio::test]
    async fn unknown_severity_is_a_decode_error() {
        let pool = setup().await;
        insert_alert(&pool, "FA-003", "2023-10-02", "catastrophic").await;

        let repo = SqlFraudAlertRepository::new(pool);
        let err = repo.list().await.expect_err("should fail to decode");
        assert!(err.to_string().contains("catastrophic"));
    }
}
