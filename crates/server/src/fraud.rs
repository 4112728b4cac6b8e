//! Fraud detection views: the alert feed plus two aggregations over it.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use securegov_core::domain::fraud::{AlertSeverity, FraudAlert};
use securegov_db::repositories::{
    AnalyticsRepository, FraudAlertRepository, SqlAnalyticsRepository, SqlFraudAlertRepository,
};

use crate::portal::{bad_request, db_error, ApiError, PortalState};

#[derive(Debug, Default, Deserialize)]
pub struct FraudQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    pub id: String,
    pub date: NaiveDate,
    pub agency: String,
    pub description: String,
    pub amount: Decimal,
    pub risk_score: i64,
    pub severity: AlertSeverity,
    pub pattern: String,
    pub created_at: DateTime<Utc>,
}

impl From<FraudAlert> for AlertView {
    fn from(alert: FraudAlert) -> Self {
        Self {
            id: alert.id,
            date: alert.date,
            agency: alert.agency,
            description: alert.description,
            amount: alert.amount,
            risk_score: alert.risk_score,
            severity: alert.severity,
            pattern: alert.pattern,
            created_at: alert.created_at,
        }
    }
}

pub(crate) async fn fraud_index(
    State(state): State<PortalState>,
    Query(query): Query<FraudQuery>,
) -> Result<Response, ApiError> {
    let analytics = SqlAnalyticsRepository::new(state.db_pool.clone());
    match query.kind.as_deref().map(str::trim).unwrap_or("alerts") {
        "" | "alerts" => Ok(Json(list_alerts(&state).await?).into_response()),
        "patterns" => {
            Ok(Json(analytics.fraud_patterns().await.map_err(db_error)?).into_response())
        }
        "trends" => Ok(Json(analytics.fraud_trends().await.map_err(db_error)?).into_response()),
        other => Err(bad_request(format!("unknown fraud view `{other}`"))),
    }
}

async fn list_alerts(state: &PortalState) -> Result<Vec<AlertView>, ApiError> {
    let repo = SqlFraudAlertRepository::new(state.db_pool.clone());
    let alerts = repo.list().await.map_err(db_error)?;
    Ok(alerts.into_iter().map(AlertView::from).collect())
}
