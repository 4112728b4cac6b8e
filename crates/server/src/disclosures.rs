//! Whistleblower report intake and triage.
//!
//! Intake is deliberately unauthenticated so reports can be filed
//! anonymously. Whatever the caller claims, a new report always enters at
//! `unverified`, and anonymous submissions never store contact details.
//! Reading and triaging reports is an administrator surface.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use securegov_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome};
use securegov_core::auth::SessionClaims;
use securegov_core::domain::disclosure::{ReportStatus, WhistleblowerReport};
use securegov_db::repositories::{DisclosureRepository, SqlDisclosureRepository};

use crate::portal::{
    bad_request, db_error, normalized_id, not_found, record_audit, uuid_v4, ApiError, PortalState,
};

#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReportBody {
    pub category: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    #[serde(default, rename = "isAnonymous")]
    pub is_anonymous: bool,
    #[serde(default, rename = "evidenceUrls")]
    pub evidence_urls: Vec<String>,
    #[serde(default, rename = "submitterName")]
    pub submitter_name: Option<String>,
    #[serde(default, rename = "submitterEmail")]
    pub submitter_email: Option<String>,
    #[serde(default, rename = "submitterPhone")]
    pub submitter_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub id: String,
    pub date: NaiveDate,
    pub category: String,
    pub description: String,
    pub status: ReportStatus,
    pub is_anonymous: bool,
    pub evidence_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WhistleblowerReport> for ReportView {
    fn from(report: WhistleblowerReport) -> Self {
        Self {
            id: report.id,
            date: report.date,
            category: report.category,
            description: report.description,
            status: report.status,
            is_anonymous: report.is_anonymous,
            evidence_urls: report.evidence_urls,
            submitter_name: report.submitter_name,
            submitter_email: report.submitter_email,
            submitter_phone: report.submitter_phone,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

pub(crate) async fn submit_report(
    State(state): State<PortalState>,
    Json(body): Json<ReportBody>,
) -> Result<Json<ReportView>, ApiError> {
    let category = body.category.trim();
    let description = body.description.trim();
    if category.is_empty() || description.is_empty() {
        return Err(bad_request("category and description are required"));
    }

    let evidence_urls: Vec<String> = body
        .evidence_urls
        .iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();

    let (submitter_name, submitter_email, submitter_phone) = if body.is_anonymous {
        (None, None, None)
    } else {
        (
            clean_optional(body.submitter_name),
            clean_optional(body.submitter_email),
            clean_optional(body.submitter_phone),
        )
    };

    let correlation_id = uuid_v4();
    let now = Utc::now();
    let report = WhistleblowerReport {
        id: format!("WB-{}", &uuid_v4()[..12]),
        date: body.date.unwrap_or_else(|| now.date_naive()),
        category: category.to_string(),
        description: description.to_string(),
        status: ReportStatus::Unverified,
        is_anonymous: body.is_anonymous,
        evidence_urls,
        submitter_name,
        submitter_email,
        submitter_phone,
        created_at: now,
        updated_at: now,
    };

    let repo = SqlDisclosureRepository::new(state.db_pool.clone());
    repo.insert(report.clone()).await.map_err(db_error)?;

    record_audit(
        &state.db_pool,
        &AuditEvent::new(
            AuditContext::new(None, correlation_id.clone(), "portal"),
            "report.submitted",
            AuditCategory::Intake,
            AuditOutcome::Success,
        )
        .with_metadata("report_id", report.id.clone())
        .with_metadata("category", report.category.clone())
        .with_metadata("anonymous", if report.is_anonymous { "true" } else { "false" }),
    )
    .await;

    // Submitter details stay out of the logs.
    info!(
        event_name = "portal.report.submitted",
        correlation_id = %correlation_id,
        report_id = %report.id,
        category = %report.category,
        anonymous = report.is_anonymous,
        "whistleblower report submitted"
    );

    Ok(Json(ReportView::from(report)))
}

pub(crate) async fn reports_index(
    State(state): State<PortalState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let repo = SqlDisclosureRepository::new(state.db_pool.clone());
    match normalized_id(query.id.as_deref()) {
        Some(id) => {
            let report = repo
                .find_by_id(id)
                .await
                .map_err(db_error)?
                .ok_or_else(|| not_found(format!("report {id} not found")))?;
            Ok(Json(ReportView::from(report)).into_response())
        }
        None => {
            let reports = repo.list().await.map_err(db_error)?;
            let views: Vec<ReportView> = reports.into_iter().map(ReportView::from).collect();
            Ok(Json(views).into_response())
        }
    }
}

pub(crate) async fn update_report_status(
    State(state): State<PortalState>,
    Query(query): Query<ReportQuery>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ReportView>, ApiError> {
    let id = normalized_id(query.id.as_deref())
        .ok_or_else(|| bad_request("query parameter `id` is required"))?;
    let status = ReportStatus::parse(&body.status)
        .ok_or_else(|| bad_request(format!("unknown report status `{}`", body.status)))?;

    let repo = SqlDisclosureRepository::new(state.db_pool.clone());
    let before = repo
        .find_by_id(id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(format!("report {id} not found")))?;
    let updated = repo
        .update_status(id, status)
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(format!("report {id} not found")))?;

    let correlation_id = uuid_v4();
    record_audit(
        &state.db_pool,
        &AuditEvent::new(
            AuditContext::new(None, correlation_id.clone(), claims.sub.clone()),
            "report.status_changed",
            AuditCategory::Decision,
            AuditOutcome::Success,
        )
        .with_metadata("report_id", updated.id.clone())
        .with_metadata("status_before", before.status.as_str())
        .with_metadata("status_after", updated.status.as_str()),
    )
    .await;

    info!(
        event_name = "portal.report.status_changed",
        correlation_id = %correlation_id,
        report_id = %updated.id,
        status_before = before.status.as_str(),
        status_after = updated.status.as_str(),
        "report status changed"
    );

    Ok(Json(ReportView::from(updated)))
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use secrecy::SecretString;

    use securegov_core::config::AuthConfig;
    use securegov_core::domain::account::AccountRole;
    use securegov_db::{connect_with_settings, migrations};

    use super::*;

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn state(pool: sqlx::SqlitePool) -> PortalState {
        let secret: SecretString = "reports-test-secret-0123456789".to_string().into();
        PortalState {
            db_pool: pool,
            auth: AuthConfig { token_secret: secret, session_ttl_secs: 3_600 },
        }
    }

    fn admin_claims() -> SessionClaims {
        let now = Utc::now().timestamp();
        SessionClaims {
            sub: "admin@securegov.example".to_string(),
            name: "Amara Okafor".to_string(),
            role: AccountRole::Admin,
            signer_role: None,
            iat: now,
            exp: now + 3_600,
        }
    }

    fn sample_body() -> ReportBody {
        ReportBody {
            category: "procurement".to_string(),
            description: "Shell vendor invoices routed through a relative.".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 10, 12),
            is_anonymous: true,
            evidence_urls: vec![],
            submitter_name: None,
            submitter_email: None,
            submitter_phone: None,
        }
    }

    async fn submit(state: &PortalState, body: ReportBody) -> Result<ReportView, ApiError> {
        submit_report(State(state.clone()), Json(body)).await.map(|Json(view)| view)
    }

    #[tokio::test]
    async fn intake_forces_unverified_and_strips_contact_details_when_anonymous() {
        let pool = setup().await;
        let state = state(pool.clone());

        let mut body = sample_body();
        body.submitter_name = Some("Jane Whistler".to_string());
        body.submitter_email = Some("jane@example.org".to_string());

        let view = submit(&state, body).await.expect("submit");

        assert!(view.id.starts_with("WB-"));
        assert_eq!(view.status, ReportStatus::Unverified);
        assert!(view.is_anonymous);
        assert!(view.submitter_name.is_none());
        assert!(view.submitter_email.is_none());

        let stored_name: Option<String> = sqlx::query_scalar(
            "SELECT submitter_name FROM whistleblower_reports WHERE id = ?",
        )
        .bind(&view.id)
        .fetch_one(&pool)
        .await
        .expect("fetch");
        assert!(stored_name.is_none());
    }

    #[tokio::test]
    async fn intake_keeps_contact_details_for_named_submissions() {
        let pool = setup().await;
        let state = state(pool);

        let mut body = sample_body();
        body.is_anonymous = false;
        body.submitter_name = Some("  Jane Whistler  ".to_string());
        body.submitter_email = Some("jane@example.org".to_string());

        let view = submit(&state, body).await.expect("submit");

        assert!(!view.is_anonymous);
        assert_eq!(view.submitter_name.as_deref(), Some("Jane Whistler"));
        assert_eq!(view.submitter_email.as_deref(), Some("jane@example.org"));
    }

    #[tokio::test]
    async fn intake_requires_category_and_description() {
        let pool = setup().await;
        let state = state(pool);

        let mut body = sample_body();
        body.description = "   ".to_string();

        let (status, _) = submit(&state, body).await.expect_err("blank description");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn intake_drops_blank_evidence_urls() {
        let pool = setup().await;
        let state = state(pool);

        let mut body = sample_body();
        body.evidence_urls =
            vec!["   ".to_string(), "https://evidence.example/doc.pdf".to_string()];

        let view = submit(&state, body).await.expect("submit");
        assert_eq!(view.evidence_urls, vec!["https://evidence.example/doc.pdf"]);
    }

    #[tokio::test]
    async fn triage_moves_a_report_and_records_the_transition() {
        let pool = setup().await;
        let state = state(pool.clone());
        let view = submit(&state, sample_body()).await.expect("submit");

        let updated = update_report_status(
            State(state.clone()),
            Query(ReportQuery { id: Some(view.id.clone()) }),
            Extension(admin_claims()),
            Json(StatusBody { status: "investigating".to_string() }),
        )
        .await
        .map(|Json(view)| view)
        .expect("update");

        assert_eq!(updated.status, ReportStatus::Investigating);

        let recorded: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_events
             WHERE event_type = 'report.status_changed'
               AND metadata_json LIKE '%\"status_before\":\"unverified\"%'",
        )
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(recorded, 1);
    }

    #[tokio::test]
    async fn triage_rejects_an_unknown_status() {
        let pool = setup().await;
        let state = state(pool);
        let view = submit(&state, sample_body()).await.expect("submit");

        let result = update_report_status(
            State(state.clone()),
            Query(ReportQuery { id: Some(view.id) }),
            Extension(admin_claims()),
            Json(StatusBody { status: "escalated".to_string() }),
        )
        .await;

        let (status, Json(error)) = result.expect_err("unknown status");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(error.error.contains("escalated"));
    }

    #[tokio::test]
    async fn triage_of_a_missing_report_is_not_found() {
        let pool = setup().await;
        let state = state(pool);

        let result = update_report_status(
            State(state.clone()),
            Query(ReportQuery { id: Some("WB-0000".to_string()) }),
            Extension(admin_claims()),
            Json(StatusBody { status: "verified".to_string() }),
        )
        .await;

        let (status, _) = result.expect_err("missing report");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reports_index_misses_with_not_found() {
        let pool = setup().await;
        let state = state(pool);

        let result = reports_index(
            State(state),
            Query(ReportQuery { id: Some("WB-0000".to_string()) }),
        )
        .await;

        let error = result.err().expect("missing report");
        assert_eq!(error.0, StatusCode::NOT_FOUND);
    }
}
