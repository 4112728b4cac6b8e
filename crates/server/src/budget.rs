//! Budget ledger views and the administrative write path.
//!
//! `GET /budget` multiplexes on `?type=`: the raw transaction ledger
//! (default), headline `summary` figures, per-agency `allocation`, and
//! monthly `trends`. `POST /budget` records a transaction and sits behind
//! the administrator middleware.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use securegov_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome};
use securegov_core::auth::SessionClaims;
use securegov_core::domain::transaction::{BudgetTransaction, RiskLevel, TransactionStatus};
use securegov_db::repositories::{
    AnalyticsRepository, SqlAnalyticsRepository, SqlTransactionRepository, TransactionRepository,
};

use crate::portal::{bad_request, db_error, record_audit, uuid_v4, ApiError, PortalState};

#[derive(Debug, Default, Deserialize)]
pub struct BudgetQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionBody {
    pub date: NaiveDate,
    pub agency: String,
    pub description: String,
    pub amount: Decimal,
    pub status: Option<String>,
    pub risk: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: String,
    pub date: NaiveDate,
    pub agency: String,
    pub description: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub risk: RiskLevel,
    pub created_at: DateTime<Utc>,
}

impl From<BudgetTransaction> for TransactionView {
    fn from(transaction: BudgetTransaction) -> Self {
        Self {
            id: transaction.id,
            date: transaction.date,
            agency: transaction.agency,
            description: transaction.description,
            amount: transaction.amount,
            status: transaction.status,
            risk: transaction.risk,
            created_at: transaction.created_at,
        }
    }
}

pub(crate) async fn budget_index(
    State(state): State<PortalState>,
    Query(query): Query<BudgetQuery>,
) -> Result<Response, ApiError> {
    let repo = SqlAnalyticsRepository::new(state.db_pool.clone());
    match query.kind.as_deref().map(str::trim).unwrap_or("transactions") {
        "" | "transactions" => Ok(Json(list_transactions(&state).await?).into_response()),
        "summary" => Ok(Json(repo.budget_summary().await.map_err(db_error)?).into_response()),
        "allocation" => {
            Ok(Json(repo.budget_allocation().await.map_err(db_error)?).into_response())
        }
        "trends" => Ok(Json(repo.budget_trends().await.map_err(db_error)?).into_response()),
        other => Err(bad_request(format!("unknown budget view `{other}`"))),
    }
}

async fn list_transactions(state: &PortalState) -> Result<Vec<TransactionView>, ApiError> {
    let repo = SqlTransactionRepository::new(state.db_pool.clone());
    let transactions = repo.list().await.map_err(db_error)?;
    Ok(transactions.into_iter().map(TransactionView::from).collect())
}

pub(crate) async fn record_transaction(
    State(state): State<PortalState>,
    Extension(claims): Extension<SessionClaims>,
    Json(body): Json<TransactionBody>,
) -> Result<Json<TransactionView>, ApiError> {
    let agency = body.agency.trim();
    let description = body.description.trim();
    if agency.is_empty() || description.is_empty() {
        return Err(bad_request("agency and description are required"));
    }
    if body.amount <= Decimal::ZERO {
        return Err(bad_request("amount must be positive"));
    }

    let status = match body.status.as_deref().map(str::trim) {
        None | Some("") => TransactionStatus::Approved,
        Some(raw) => TransactionStatus::parse(raw)
            .ok_or_else(|| bad_request(format!("unknown transaction status `{raw}`")))?,
    };
    let risk = match body.risk.as_deref().map(str::trim) {
        None | Some("") => RiskLevel::Low,
        Some(raw) => RiskLevel::parse(raw)
            .ok_or_else(|| bad_request(format!("unknown risk level `{raw}`")))?,
    };

    let correlation_id = uuid_v4();
    let transaction = BudgetTransaction {
        id: format!("TR-{}", &uuid_v4()[..12]),
        date: body.date,
        agency: agency.to_string(),
        description: description.to_string(),
        amount: body.amount,
        status,
        risk,
        created_at: Utc::now(),
    };

    let repo = SqlTransactionRepository::new(state.db_pool.clone());
    repo.insert(transaction.clone()).await.map_err(db_error)?;

    record_audit(
        &state.db_pool,
        &AuditEvent::new(
            AuditContext::new(None, correlation_id.clone(), claims.sub.clone()),
            "transaction.recorded",
            AuditCategory::Persistence,
            AuditOutcome::Success,
        )
        .with_metadata("transaction_id", transaction.id.clone())
        .with_metadata("agency", transaction.agency.clone())
        .with_metadata("amount", transaction.amount.to_string())
        .with_metadata("status", transaction.status.as_str()),
    )
    .await;

    info!(
        event_name = "portal.budget.transaction_recorded",
        correlation_id = %correlation_id,
        transaction_id = %transaction.id,
        agency = %transaction.agency,
        amount = %transaction.amount,
        "budget transaction recorded"
    );

    Ok(Json(TransactionView::from(transaction)))
}
