//! JSON API routes for the public transparency portal.
//!
//! Endpoints:
//! - `GET   /approvals[?id=]`: list approval requests, or fetch one
//! - `PATCH /approvals?id=`: record a signer decision (signer session)
//! - `POST  /auth/session`: exchange credentials for a session token
//! - `GET   /budget?type=`: ledger, summary, allocation, trends
//! - `POST  /budget`: record a transaction (admin session)
//! - `GET   /fraud?type=`: alerts, patterns, trends
//! - `GET   /reports[?id=]`: whistleblower reports (admin session)
//! - `POST  /reports`: report intake, anonymous allowed
//! - `PATCH /reports?id=`: move a report through triage (admin session)
//! - `GET   /public-reports[?id=|?type=]`: published documents
//! - `GET   /activity[?limit=]`: cross-ledger activity feed

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use securegov_core::approvals::{self, DecisionError, DecisionInput};
use securegov_core::audit::{AuditContext, AuditEvent};
use securegov_core::auth::SessionClaims;
use securegov_core::config::AuthConfig;
use securegov_core::domain::approval::{
    ApprovalRequest, Decision, DecisionStatus, RequestId, RoleApproval, SignerRole,
};
use securegov_db::repositories::{
    ApprovalRepository, RepositoryError, SqlApprovalRepository, SqlAuditEventStore,
};
use securegov_db::DbPool;

use crate::{activity, budget, disclosures, fraud, publications, session};

#[derive(Clone)]
pub struct PortalState {
    pub db_pool: DbPool,
    pub auth: AuthConfig,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PortalError {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<PortalError>);

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub role: String,
    pub status: String,
    #[serde(default, rename = "rejectionReason")]
    pub rejection_reason: Option<String>,
}

/// Wire shape of an approval request. Domain names are snake_case; the
/// portal has always spoken camelCase, so the view does the renaming.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalView {
    pub id: String,
    pub description: String,
    pub agency: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub status: DecisionStatus,
    pub approvals: Vec<RoleApproval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ApprovalRequest> for ApprovalView {
    fn from(request: ApprovalRequest) -> Self {
        Self {
            id: request.id.0,
            description: request.description,
            agency: request.agency,
            date: request.date,
            amount: request.amount,
            status: request.status,
            approvals: request.approvals,
            rejection_reason: request.rejection_reason,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(db_pool: DbPool, auth: AuthConfig) -> Router {
    let state = PortalState { db_pool, auth };

    let public = Router::new()
        .route("/approvals", get(approvals_index))
        .route("/auth/session", post(session::create_session))
        .route("/budget", get(budget::budget_index))
        .route("/fraud", get(fraud::fraud_index))
        .route("/reports", post(disclosures::submit_report))
        .route("/public-reports", get(publications::publications_index))
        .route("/activity", get(activity::activity_index));

    let signer = Router::new()
        .route("/approvals", patch(decide_approval))
        .route_layer(middleware::from_fn_with_state(state.clone(), session::require_session));

    let admin = Router::new()
        .route("/budget", post(budget::record_transaction))
        .route(
            "/reports",
            get(disclosures::reports_index).patch(disclosures::update_report_status),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), session::require_admin));

    public.merge(signer).merge(admin).with_state(state)
}

// ---------------------------------------------------------------------------
// Approval handlers
// ---------------------------------------------------------------------------

pub(crate) async fn approvals_index(
    State(state): State<PortalState>,
    Query(query): Query<ApprovalQuery>,
) -> Result<Response, ApiError> {
    match normalized_id(query.id.as_deref()) {
        Some(id) => Ok(Json(fetch_approval(&state, id).await?).into_response()),
        None => Ok(Json(list_approvals(&state).await?).into_response()),
    }
}

async fn list_approvals(state: &PortalState) -> Result<Vec<ApprovalView>, ApiError> {
    let repo = SqlApprovalRepository::new(state.db_pool.clone());
    let requests = repo.list().await.map_err(db_error)?;
    Ok(requests.into_iter().map(ApprovalView::from).collect())
}

async fn fetch_approval(state: &PortalState, id: &str) -> Result<ApprovalView, ApiError> {
    let repo = SqlApprovalRepository::new(state.db_pool.clone());
    let request = repo
        .find_by_id(&RequestId(id.to_string()))
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(format!("approval request {id} not found")))?;
    Ok(ApprovalView::from(request))
}

pub(crate) async fn decide_approval(
    State(state): State<PortalState>,
    Query(query): Query<ApprovalQuery>,
    Extension(claims): Extension<SessionClaims>,
    payload: Result<Json<DecisionBody>, JsonRejection>,
) -> Result<Json<ApprovalView>, ApiError> {
    // Undecodable bodies report as 400, same as the other input errors.
    let Json(body) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let id = normalized_id(query.id.as_deref())
        .ok_or_else(|| bad_request("query parameter `id` is required"))?;

    let role = SignerRole::parse(&body.role)
        .ok_or_else(|| decision_error(DecisionError::InvalidRole { role: body.role.clone() }))?;
    let decision = Decision::parse(&body.status).ok_or_else(|| {
        decision_error(DecisionError::InvalidDecision { decision: body.status.clone() })
    })?;

    // The body's role is an assertion; the session's verified claim decides.
    if claims.signer_role != Some(role) {
        return Err(forbidden(format!("session is not authorized to decide for role {role}")));
    }

    let input =
        DecisionInput { role, decision, rejection_reason: body.rejection_reason.clone() };
    let request_id = RequestId(id.to_string());
    let correlation_id = uuid_v4();

    let repo = SqlApprovalRepository::new(state.db_pool.clone());
    let outcome = repo.apply_decision(&request_id, &input).await.map_err(decision_error)?;

    let context = AuditContext::new(Some(request_id), correlation_id.clone(), claims.sub.clone());
    record_audit(&state.db_pool, &approvals::decision_event(&outcome, &input, &context)).await;

    info!(
        event_name = "portal.approval.decision_recorded",
        correlation_id = %correlation_id,
        request_id = %outcome.request.id.0,
        role = %input.role,
        decision = %input.decision.as_status(),
        overall_status = %outcome.request.status,
        "approval decision recorded"
    );

    Ok(Json(ApprovalView::from(outcome.request)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn normalized_id(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|id| !id.is_empty())
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(PortalError { error: message.into() }))
}

pub(crate) fn unauthorized(message: impl Into<String>) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(PortalError { error: message.into() }))
}

pub(crate) fn forbidden(message: impl Into<String>) -> ApiError {
    (StatusCode::FORBIDDEN, Json(PortalError { error: message.into() }))
}

pub(crate) fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(PortalError { error: message.into() }))
}

pub(crate) fn db_error(error: RepositoryError) -> ApiError {
    error!(error = %error, "portal database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(PortalError { error: "an internal error occurred".to_string() }),
    )
}

pub(crate) fn decision_error(error: DecisionError) -> ApiError {
    match &error {
        DecisionError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, Json(PortalError { error: error.to_string() }))
        }
        DecisionError::InvalidRole { .. } | DecisionError::InvalidDecision { .. } => {
            (StatusCode::BAD_REQUEST, Json(PortalError { error: error.to_string() }))
        }
        DecisionError::Storage { .. } | DecisionError::Contention { .. } => {
            error!(error = %error, "approval decision failed in storage");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PortalError { error: "an internal error occurred".to_string() }),
            )
        }
    }
}

/// Persist an audit event without failing the request that produced it.
pub(crate) async fn record_audit(pool: &DbPool, event: &AuditEvent) {
    let store = SqlAuditEventStore::new(pool.clone());
    if let Err(error) = store.record(event).await {
        error!(
            event_name = "portal.audit.write_failed",
            event_type = %event.event_type,
            error = %error,
            "failed to persist audit event"
        );
    }
}

pub(crate) fn uuid_v4() -> String {
    Uuid::new_v4().simple().to_string()
}
