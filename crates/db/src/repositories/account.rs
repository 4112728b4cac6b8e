use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use securegov_core::domain::account::{Account, AccountRole};
use securegov_core::domain::approval::SignerRole;

use super::{AccountRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAccountRepository {
    pool: DbPool,
}

impl SqlAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_account(row: SqliteRow) -> Result<Account, RepositoryError> {
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let password_hash: String =
        row.try_get("password_hash").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let display_name: String =
        row.try_get("display_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let signer_role_str: Option<String> =
        row.try_get("signer_role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let role = AccountRole::parse(&role_str).ok_or_else(|| {
        RepositoryError::Decode(format!("account {email} has unknown role `{role_str}`"))
    })?;
    let signer_role = match signer_role_str {
        Some(ref raw) => Some(SignerRole::parse(raw).ok_or_else(|| {
            RepositoryError::Decode(format!("account {email} has unknown signer role `{raw}`"))
        })?),
        None => None,
    };
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Account { email, password_hash, display_name, role, signer_role, created_at })
}

#[async_trait::async_trait]
impl AccountRepository for SqlAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query(
            "SELECT email, password_hash, display_name, role, signer_role, created_at
             FROM accounts
             WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_account).transpose()
    }

    async fn insert(&self, account: Account) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO accounts
                 (email, password_hash, display_name, role, signer_role, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET
                 password_hash = excluded.password_hash,
                 display_name = excluded.display_name,
                 role = excluded.role,
                 signer_role = excluded.signer_role",
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.display_name)
        .bind(account.role.as_str())
        .bind(account.signer_role.map(|role| role.as_str()))
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
