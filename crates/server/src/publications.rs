//! Published transparency documents. Entirely public: list, fetch one, or
//! filter by kind. When both `id` and `type` are supplied, `id` wins.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use securegov_core::domain::publication::{PublicReport, PublicReportKind};
use securegov_db::repositories::{PublicationRepository, SqlPublicationRepository};

use crate::portal::{bad_request, db_error, normalized_id, not_found, ApiError, PortalState};

#[derive(Debug, Default, Deserialize)]
pub struct PublicationQuery {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: PublicReportKind,
    pub format: String,
    pub size: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<PublicReport> for PublicationView {
    fn from(report: PublicReport) -> Self {
        Self {
            id: report.id,
            title: report.title,
            description: report.description,
            date: report.date,
            kind: report.kind,
            format: report.format,
            size: report.size,
            file_url: report.file_url,
            created_at: report.created_at,
        }
    }
}

pub(crate) async fn publications_index(
    State(state): State<PortalState>,
    Query(query): Query<PublicationQuery>,
) -> Result<Response, ApiError> {
    let repo = SqlPublicationRepository::new(state.db_pool.clone());

    if let Some(id) = normalized_id(query.id.as_deref()) {
        let report = repo
            .find_by_id(id)
            .await
            .map_err(db_error)?
            .ok_or_else(|| not_found(format!("public report {id} not found")))?;
        return Ok(Json(PublicationView::from(report)).into_response());
    }

    let reports = match query.kind.as_deref().map(str::trim).filter(|kind| !kind.is_empty()) {
        Some(raw) => {
            let kind = PublicReportKind::parse(raw)
                .ok_or_else(|| bad_request(format!("unknown report kind `{raw}`")))?;
            repo.list_by_kind(kind).await.map_err(db_error)?
        }
        None => repo.list().await.map_err(db_error)?,
    };

    let views: Vec<PublicationView> = reports.into_iter().map(PublicationView::from).collect();
    Ok(Json(views).into_response())
}
