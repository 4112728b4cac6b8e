use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use securegov_core::domain::transaction::{BudgetTransaction, RiskLevel, TransactionStatus};

use super::{RepositoryError, TransactionRepository};
use crate::DbPool;

pub struct SqlTransactionRepository {
    pool: DbPool,
}

impl SqlTransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_transaction(row: SqliteRow) -> Result<BudgetTransaction, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agency: String =
        row.try_get("agency").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let amount_text: String =
        row.try_get("amount_text").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let risk_str: String =
        row.try_get("risk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        RepositoryError::Decode(format!("transaction {id} has bad date `{date_str}`: {e}"))
    })?;
    let amount = Decimal::from_str(&amount_text).map_err(|e| {
        RepositoryError::Decode(format!("transaction {id} has bad amount `{amount_text}`: {e}"))
    })?;
    let status = TransactionStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("transaction {id} has unknown status `{status_str}`"))
    })?;
    let risk = RiskLevel::parse(&risk_str).ok_or_else(|| {
        RepositoryError::Decode(format!("transaction {id} has unknown risk `{risk_str}`"))
    })?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(BudgetTransaction { id, date, agency, description, amount, status, risk, created_at })
}

#[async_trait::async_trait]
impl TransactionRepository for SqlTransactionRepository {
    async fn list(&self) -> Result<Vec<BudgetTransaction>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                date,
                agency,
                description,
                CAST(amount AS TEXT) AS amount_text,
                status,
                risk,
                created_at
             FROM budget_transactions
             ORDER BY date DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_transaction).collect()
    }

    async fn insert(&self, transaction: BudgetTransaction) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO budget_transactions
                 (id, date, agency, description, amount, status, risk, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&transaction.id)
        .bind(transaction.date.format("%Y-%m-%d").to_string())
        .bind(&transaction.agency)
        .bind(&transaction.description)
        .bind(transaction.amount.to_string())
        .bind(transaction.status.as_str())
        .bind(transaction.risk.as_str())
        .bind(transaction.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
