//! Cross-ledger activity feed: transactions, fraud alerts, and report
//! filings interleaved newest first.

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use securegov_core::domain::analytics::{ActivityEntry, ActivityKind};
use securegov_db::repositories::{AnalyticsRepository, SqlAnalyticsRepository};

use crate::portal::{db_error, ApiError, PortalState};

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActivityView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub date: NaiveDate,
    pub description: String,
    pub agency: Option<String>,
    pub status: String,
}

impl From<ActivityEntry> for ActivityView {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind,
            date: entry.date,
            description: entry.description,
            agency: entry.agency,
            status: entry.status,
        }
    }
}

pub(crate) async fn activity_index(
    State(state): State<PortalState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityView>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let repo = SqlAnalyticsRepository::new(state.db_pool.clone());
    let entries = repo.recent_activity(limit).await.map_err(db_error)?;
    Ok(Json(entries.into_iter().map(ActivityView::from).collect()))
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use securegov_core::config::AuthConfig;
    use securegov_db::{connect_with_settings, migrations};

    use super::*;

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn state(pool: sqlx::SqlitePool) -> PortalState {
        let secret: SecretString = "activity-test-secret-0123456789".to_string().into();
        PortalState {
            db_pool: pool,
            auth: AuthConfig { token_secret: secret, session_ttl_secs: 3_600 },
        }
    }

    async fn insert_transaction(pool: &sqlx::SqlitePool, id: &str, date: &str) {
        sqlx::query(
            "INSERT INTO budget_transactions
                 (id, date, agency, description, amount, status, risk, created_at)
             VALUES (?, ?, 'Border Patrol', 'Equipment purchase', 100000, 'approved', 'low',
                     '2023-10-15T00:00:00Z')",
        )
        .bind(id)
        .bind(date)
        .execute(pool)
        .await
        .expect("insert transaction");
    }

    #[tokio::test]
    async fn activity_feed_clamps_an_oversized_limit() {
        let pool = setup().await;
        for day in 1..=9 {
            insert_transaction(&pool, &format!("TR-{day}"), &format!("2023-10-0{day}")).await;
        }
        let state = state(pool);

        let Json(views) = activity_index(
            State(state.clone()),
            Query(ActivityQuery { limit: Some(100_000) }),
        )
        .await
        .expect("feed");
        assert_eq!(views.len(), 9);

        let Json(views) =
            activity_index(State(state.clone()), Query(ActivityQuery { limit: Some(-5) }))
                .await
                .expect("feed");
        assert_eq!(views.len(), 1);
    }

    #[tokio::test]
    async fn activity_feed_serializes_kind_under_the_type_key() {
        let pool = setup().await;
        insert_transaction(&pool, "TR-1", "2023-10-15").await;
        let state = state(pool);

        let Json(views) =
            activity_index(State(state), Query(ActivityQuery::default())).await.expect("feed");

        let value = serde_json::to_value(&views[0]).expect("json");
        assert_eq!(value["type"], "transaction");
        assert!(value.get("kind").is_none());
        assert_eq!(value["agency"], "Border Patrol");
    }
}
