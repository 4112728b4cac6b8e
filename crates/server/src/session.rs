//! Credential exchange and the bearer-token middleware guarding the
//! signer and administrative surfaces.
//!
//! Login failures are deliberately uniform: unknown email and wrong
//! password produce the same 401 body, so the endpoint cannot be used to
//! enumerate accounts. The audit trail records the real reason.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use securegov_core::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome};
use securegov_core::auth::{
    issue_session_token, verify_password, verify_session_token, SessionClaims, SessionError,
};
use securegov_core::config::AuthConfig;
use securegov_core::domain::account::AccountRole;
use securegov_core::domain::approval::SignerRole;
use securegov_db::repositories::{AccountRepository, SqlAccountRepository};

use crate::portal::{
    bad_request, db_error, forbidden, record_audit, unauthorized, uuid_v4, ApiError, PortalError,
    PortalState,
};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: AccountRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_role: Option<SignerRole>,
    pub name: String,
}

pub(crate) async fn create_session(
    State(state): State<PortalState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(bad_request("email and password are required"));
    }

    let correlation_id = uuid_v4();
    let repo = SqlAccountRepository::new(state.db_pool.clone());
    let account = match repo.find_by_email(&email).await.map_err(db_error)? {
        Some(account) => account,
        None => {
            return Err(deny_session(&state, &email, &correlation_id, "unknown_account").await)
        }
    };

    if !verify_password(&body.password, &account.password_hash).map_err(auth_failure)? {
        return Err(deny_session(&state, &email, &correlation_id, "password_mismatch").await);
    }

    let issued_at = Utc::now();
    let token = issue_session_token(
        &account,
        &state.auth.token_secret,
        state.auth.session_ttl_secs,
        issued_at,
    )
    .map_err(auth_failure)?;

    record_audit(
        &state.db_pool,
        &AuditEvent::new(
            AuditContext::new(None, correlation_id.clone(), email.clone()),
            "session.created",
            AuditCategory::Session,
            AuditOutcome::Success,
        )
        .with_metadata("role", account.role.as_str()),
    )
    .await;

    info!(
        event_name = "portal.session.created",
        correlation_id = %correlation_id,
        email = %email,
        role = account.role.as_str(),
        "session created"
    );

    Ok(Json(SessionResponse {
        token,
        expires_at: issued_at + Duration::seconds(state.auth.session_ttl_secs as i64),
        role: account.role,
        signer_role: account.signer_role,
        name: account.display_name,
    }))
}

async fn deny_session(
    state: &PortalState,
    email: &str,
    correlation_id: &str,
    reason: &'static str,
) -> ApiError {
    record_audit(
        &state.db_pool,
        &AuditEvent::new(
            AuditContext::new(None, correlation_id.to_string(), email.to_string()),
            "session.denied",
            AuditCategory::Session,
            AuditOutcome::Rejected,
        )
        .with_metadata("reason", reason),
    )
    .await;

    warn!(
        event_name = "portal.session.denied",
        correlation_id = %correlation_id,
        email = %email,
        reason = %reason,
        "session denied"
    );

    unauthorized("invalid email or password")
}

fn auth_failure(error: SessionError) -> ApiError {
    error!(error = %error, "session processing failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(PortalError { error: "an internal error occurred".to_string() }),
    )
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Requires a valid bearer token and stashes its claims in the request
/// extensions for handlers to pick up.
pub(crate) async fn require_session(
    State(state): State<PortalState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authenticate(&state.auth, request.headers())?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Like `require_session`, but only administrator accounts get through.
pub(crate) async fn require_admin(
    State(state): State<PortalState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authenticate(&state.auth, request.headers())?;
    if claims.role != AccountRole::Admin {
        return Err(forbidden("this endpoint requires an administrator session"));
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

pub(crate) fn authenticate(
    auth: &AuthConfig,
    headers: &HeaderMap,
) -> Result<SessionClaims, ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| unauthorized("missing bearer token"))?;
    let value = header.to_str().map_err(|_| unauthorized("malformed authorization header"))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("authorization header must use the Bearer scheme"))?;

    verify_session_token(token.trim(), &auth.token_secret).map_err(|error| match error {
        SessionError::TokenExpired => unauthorized("session token has expired"),
        _ => unauthorized("session token is invalid"),
    })
}
