use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use securegov_core::domain::publication::{PublicReport, PublicReportKind};

use super::{PublicationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPublicationRepository {
    pool: DbPool,
}

impl SqlPublicationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_report(row: SqliteRow) -> Result<PublicReport, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind_str: String =
        row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let format: String =
        row.try_get("format").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let size: String = row.try_get("size").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let file_url: String =
        row.try_get("file_url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        RepositoryError::Decode(format!("public report {id} has bad date `{date_str}`: {e}"))
    })?;
    let kind = PublicReportKind::parse(&kind_str).ok_or_else(|| {
        RepositoryError::Decode(format!("public report {id} has unknown kind `{kind_str}`"))
    })?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(PublicReport { id, title, description, date, kind, format, size, file_url, created_at })
}

#[async_trait::async_trait]
impl PublicationRepository for SqlPublicationRepository {
    async fn list(&self) -> Result<Vec<PublicReport>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, description, date, kind, format, size, file_url, created_at
             FROM public_reports
             ORDER BY date DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_report).collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PublicReport>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, description, date, kind, format, size, file_url, created_at
             FROM public_reports
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_report).transpose()
    }

    async fn list_by_kind(
        &self,
        kind: PublicReportKind,
    ) -> Result<Vec<PublicReport>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, description, date, kind, format, size, file_url, created_at
             FROM public_reports
             WHERE kind = ?
             ORDER BY date DESC, id ASC",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_report).collect()
    }
}
