//! Session tokens and password verification for the portal.
//!
//! Tokens are HS256 JWTs signed with `auth.token_secret`. Claims carry the
//! account's portal role and, for signer accounts, the approval role their
//! sessions may decide for.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::account::{Account, AccountRole};
use crate::domain::approval::SignerRole;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account email.
    pub sub: String,
    pub name: String,
    pub role: AccountRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_role: Option<SignerRole>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session token has expired")]
    TokenExpired,
    #[error("session token is invalid: {0}")]
    TokenInvalid(String),
    #[error("could not sign session token: {0}")]
    TokenSigning(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

pub fn issue_session_token(
    account: &Account,
    secret: &SecretString,
    ttl_secs: u64,
    issued_at: DateTime<Utc>,
) -> Result<String, SessionError> {
    let claims = SessionClaims {
        sub: account.email.clone(),
        name: account.display_name.clone(),
        role: account.role,
        signer_role: account.signer_role,
        iat: issued_at.timestamp(),
        exp: issued_at.timestamp() + ttl_secs as i64,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.expose_secret().as_bytes()))
        .map_err(|err| SessionError::TokenSigning(err.to_string()))
}

pub fn verify_session_token(
    token: &str,
    secret: &SecretString,
) -> Result<SessionClaims, SessionError> {
    let decoded = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::TokenExpired,
        _ => SessionError::TokenInvalid(err.to_string()),
    })?;

    Ok(decoded.claims)
}

pub fn verify_password(plain: &str, password_hash: &str) -> Result<bool, SessionError> {
    bcrypt::verify(plain, password_hash)
        .map_err(|err| SessionError::PasswordHash(err.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use secrecy::SecretString;

    use super::{issue_session_token, verify_password, verify_session_token, SessionError};
    use crate::domain::account::{Account, AccountRole};
    use crate::domain::approval::SignerRole;

    fn secret() -> SecretString {
        "portal-secret-0123456789".to_string().into()
    }

    fn signer_account() -> Account {
        Account {
            email: "auditor@example.gov".to_string(),
            password_hash: String::new(),
            display_name: "John Adebayo".to_string(),
            role: AccountRole::Admin,
            signer_role: Some(SignerRole::Auditor),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_tokens_round_trip_their_claims() {
        let token = issue_session_token(&signer_account(), &secret(), 3_600, Utc::now())
            .expect("token should be issued");

        let claims = verify_session_token(&token, &secret()).expect("token should verify");
        assert_eq!(claims.sub, "auditor@example.gov");
        assert_eq!(claims.role, AccountRole::Admin);
        assert_eq!(claims.signer_role, Some(SignerRole::Auditor));
        assert_eq!(claims.exp - claims.iat, 3_600);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let issued_at = Utc::now() - Duration::hours(3);
        let token = issue_session_token(&signer_account(), &secret(), 60, issued_at)
            .expect("token should be issued");

        let error = verify_session_token(&token, &secret()).expect_err("token should be expired");
        assert!(matches!(error, SessionError::TokenExpired));
    }

    #[test]
    fn tokens_signed_with_a_different_secret_are_rejected() {
        let token = issue_session_token(&signer_account(), &secret(), 3_600, Utc::now())
            .expect("token should be issued");

        let other: SecretString = "another-secret-abcdefghij".to_string().into();
        let error = verify_session_token(&token, &other).expect_err("signature should not verify");
        assert!(matches!(error, SessionError::TokenInvalid(_)));
    }

    #[test]
    fn password_verification_accepts_only_the_original_password() {
        // Low cost keeps the test fast; production hashing uses DEFAULT_COST.
        let hash = bcrypt::hash("correct horse", 4).expect("hash should succeed");

        assert!(verify_password("correct horse", &hash).expect("verify should succeed"));
        assert!(!verify_password("wrong horse", &hash).expect("verify should succeed"));
    }
}
