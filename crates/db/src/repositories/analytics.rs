use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use securegov_core::domain::analytics::{
    ActivityEntry, ActivityKind, AgencyAllocation, BudgetSummary, FraudPatternCount,
    MonthlyAlertCount, MonthlyBudget,
};

use super::{AnalyticsRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAnalyticsRepository {
    pool: DbPool,
}

impl SqlAnalyticsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let text: String = row.try_get(column).map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Decimal::from_str(&text)
        .map_err(|e| RepositoryError::Decode(format!("column {column} held `{text}`: {e}")))
}

fn percentage_of(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    (part / whole * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
}

#[async_trait::async_trait]
impl AnalyticsRepository for SqlAnalyticsRepository {
    async fn budget_summary(&self) -> Result<BudgetSummary, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                CAST(COALESCE(SUM(amount), 0) AS TEXT) AS total_text,
                CAST(COALESCE(SUM(CASE WHEN status = 'approved' THEN amount ELSE 0 END), 0) AS TEXT)
                    AS allocated_text
             FROM budget_transactions",
        )
        .fetch_one(&self.pool)
        .await?;

        let total = decimal_column(&row, "total_text")?;
        let allocated = decimal_column(&row, "allocated_text")?;

        Ok(BudgetSummary {
            total,
            allocated,
            remaining: total - allocated,
            utilization_percentage: percentage_of(allocated, total),
        })
    }

    async fn budget_allocation(&self) -> Result<Vec<AgencyAllocation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT agency, CAST(SUM(amount) AS TEXT) AS amount_text
             FROM budget_transactions
             GROUP BY agency
             ORDER BY SUM(amount) DESC, agency ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut slices = Vec::with_capacity(rows.len());
        for row in &rows {
            let agency: String =
                row.try_get("agency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let amount = decimal_column(row, "amount_text")?;
            slices.push((agency, amount));
        }

        let total: Decimal = slices.iter().map(|(_, amount)| *amount).sum();
        Ok(slices
            .into_iter()
            .map(|(agency, amount)| AgencyAllocation {
                agency,
                amount,
                percentage: percentage_of(amount, total),
            })
            .collect())
    }

    async fn budget_trends(&self) -> Result<Vec<MonthlyBudget>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                substr(date, 1, 7) AS month,
                CAST(SUM(amount) AS TEXT) AS allocated_text,
                CAST(COALESCE(SUM(CASE WHEN status = 'approved' THEN amount ELSE 0 END), 0) AS TEXT)
                    AS spent_text
             FROM budget_transactions
             GROUP BY substr(date, 1, 7)
             ORDER BY month ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let month: String =
                    row.try_get("month").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(MonthlyBudget {
                    month,
                    allocated: decimal_column(row, "allocated_text")?,
                    spent: decimal_column(row, "spent_text")?,
                })
            })
            .collect()
    }

    async fn fraud_patterns(&self) -> Result<Vec<FraudPatternCount>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT pattern, COUNT(*) AS alert_count
             FROM fraud_alerts
             GROUP BY pattern
             ORDER BY alert_count DESC, pattern ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(FraudPatternCount {
                    pattern: row
                        .try_get("pattern")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    count: row
                        .try_get("alert_count")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn fraud_trends(&self) -> Result<Vec<MonthlyAlertCount>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT substr(date, 1, 7) AS month, COUNT(*) AS alert_count
             FROM fraud_alerts
             GROUP BY substr(date, 1, 7)
             ORDER BY month ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MonthlyAlertCount {
                    month: row
                        .try_get("month")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                    alerts: row
                        .try_get("alert_count")
                        .map_err(|e| RepositoryError::Decode(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>, RepositoryError> {
        // Disclosure rows surface only their category; the narrative stays
        // behind the reports endpoint.
        let rows = sqlx::query(
            "SELECT id, 'transaction' AS kind, date, description, agency, status
             FROM budget_transactions
             UNION ALL
             SELECT id, 'alert' AS kind, date, description, agency, severity AS status
             FROM fraud_alerts
             UNION ALL
             SELECT id, 'report' AS kind, date, category AS description, NULL AS agency, status
             FROM whistleblower_reports
             ORDER BY date DESC, id ASC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let kind_str: String =
                    row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let date_str: String =
                    row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let description: String = row
                    .try_get("description")
                    .map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let agency: Option<String> =
                    row.try_get("agency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                let status: String =
                    row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

                let kind = match kind_str.as_str() {
                    "transaction" => ActivityKind::Transaction,
                    "alert" => ActivityKind::Alert,
                    "report" => ActivityKind::Report,
                    other => {
                        return Err(RepositoryError::Decode(format!(
                            "activity row {id} has unknown kind `{other}`"
                        )))
                    }
                };
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    RepositoryError::Decode(format!("activity row {id} has bad date: {e}"))
                })?;

                Ok(ActivityEntry { id, kind, date, description, agency, status })
            })
            .collect()
    }
}
