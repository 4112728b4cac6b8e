use sqlx::Executor;

use securegov_core::domain::account::{Account, AccountRole};
use securegov_core::domain::approval::SignerRole;

use crate::connection::DbPool;
use crate::repositories::{AccountRepository, RepositoryError, SqlAccountRepository};

/// Canonical demo approval requests and the stored state each must land in.
const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        request_id: "AP-7829",
        status: "pending",
        entry_count: 2,
        rejection_reason: None,
        description: "Procurement of medical supplies, auditor signed",
    },
    SeedRequestContract {
        request_id: "AP-6547",
        status: "pending",
        entry_count: 2,
        rejection_reason: None,
        description: "Cybersecurity training, no decisions yet",
    },
    SeedRequestContract {
        request_id: "AP-9823",
        status: "rejected",
        entry_count: 2,
        rejection_reason: Some(
            "Duplicate payment detected. Similar transaction processed on 2023-09-05.",
        ),
        description: "Intelligence software, rejected by the international signer",
    },
    SeedRequestContract {
        request_id: "AP-4521",
        status: "approved",
        entry_count: 2,
        rejection_reason: None,
        description: "Vehicle fleet maintenance, fully signed",
    },
    SeedRequestContract {
        request_id: "AP-3365",
        status: "pending",
        entry_count: 3,
        rejection_reason: None,
        description: "Communication equipment, kept in the retired three-role shape",
    },
];

/// Demo portal accounts. Hashed and inserted at load time rather than via
/// the SQL fixture so no bcrypt output is committed to the tree.
const SEED_ACCOUNTS: &[SeedAccountContract] = &[
    SeedAccountContract {
        email: "auditor@securegov.example",
        password: "auditor-demo",
        display_name: "John Adebayo",
        role: AccountRole::Admin,
        signer_role: Some(SignerRole::Auditor),
    },
    SeedAccountContract {
        email: "observer@securegov.example",
        password: "observer-demo",
        display_name: "Lena Virtanen",
        role: AccountRole::Admin,
        signer_role: Some(SignerRole::InternationalOrganization),
    },
    SeedAccountContract {
        email: "admin@securegov.example",
        password: "admin-demo",
        display_name: "Nadia Bello",
        role: AccountRole::Admin,
        signer_role: None,
    },
    SeedAccountContract {
        email: "citizen@securegov.example",
        password: "citizen-demo",
        display_name: "Civic Observer",
        role: AccountRole::Citizen,
        signer_role: None,
    },
];

const SEED_TRANSACTION_IDS: &[&str] = &["TR-7829", "TR-6547", "TR-9823", "TR-4521", "TR-3365"];

const SEED_ALERT_IDS: &[&str] = &["FA-0991", "FA-0992", "FA-0993", "FA-0994"];

const SEED_REPORT_IDS: &[&str] = &["WB-2023-087", "WB-2023-088", "WB-2023-089"];

const SEED_PUBLIC_REPORT_IDS: &[&str] = &["PR-2023-Q3", "PR-2023-AUD", "PR-2023-SUS"];

/// Deterministic demo dataset for the transparency portal.
///
/// Covers every ledger the portal reads: approval requests in all three
/// overall states (plus one legacy-shaped row), the budget ledger, fraud
/// alerts, whistleblower reports, public reports, and the demo accounts.
pub struct DemoDataset;

impl DemoDataset {
    /// SQL fixture content for the demo rows.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset. Safe to run repeatedly; every row is keyed.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        Self::load_with_cost(pool, bcrypt::DEFAULT_COST).await
    }

    /// `load` with an explicit bcrypt cost. Tests pass a low cost; the
    /// default cost takes hundreds of milliseconds per account.
    pub async fn load_with_cost(
        pool: &DbPool,
        bcrypt_cost: u32,
    ) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let accounts = SqlAccountRepository::new(pool.clone());
        for contract in SEED_ACCOUNTS {
            let password_hash = bcrypt::hash(contract.password, bcrypt_cost)
                .map_err(|e| RepositoryError::Decode(format!("hash demo password: {e}")))?;
            accounts
                .insert(Account {
                    email: contract.email.to_string(),
                    password_hash,
                    display_name: contract.display_name.to_string(),
                    role: contract.role,
                    signer_role: contract.signer_role,
                    created_at: chrono::Utc::now(),
                })
                .await?;
        }

        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|request| RequestSeedInfo {
                request_id: request.request_id,
                status: request.status,
                description: request.description,
            })
            .collect::<Vec<_>>();

        Ok(SeedResult { requests_seeded, accounts_seeded: SEED_ACCOUNTS.len() })
    }

    /// Verify that the seeded rows exist and match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for request in SEED_REQUESTS {
            let stored_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM approval_requests
                     WHERE id = ?1 AND status = ?2 AND json_array_length(approvals) = ?3
                 )",
            )
            .bind(request.request_id)
            .bind(request.status)
            .bind(request.entry_count)
            .fetch_one(pool)
            .await?;
            checks.push((request.request_id, stored_ok == 1));

            if let Some(reason) = request.rejection_reason {
                let reason_ok: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(
                         SELECT 1 FROM approval_requests WHERE id = ?1 AND rejection_reason = ?2
                     )",
                )
                .bind(request.request_id)
                .bind(reason)
                .fetch_one(pool)
                .await?;
                checks.push(("rejection-reason", reason_ok == 1));
            }
        }

        checks.push((
            "budget-transactions",
            count_by_ids(pool, "budget_transactions", SEED_TRANSACTION_IDS).await?
                == SEED_TRANSACTION_IDS.len() as i64,
        ));
        checks.push((
            "fraud-alerts",
            count_by_ids(pool, "fraud_alerts", SEED_ALERT_IDS).await?
                == SEED_ALERT_IDS.len() as i64,
        ));
        checks.push((
            "whistleblower-reports",
            count_by_ids(pool, "whistleblower_reports", SEED_REPORT_IDS).await?
                == SEED_REPORT_IDS.len() as i64,
        ));
        checks.push((
            "public-reports",
            count_by_ids(pool, "public_reports", SEED_PUBLIC_REPORT_IDS).await?
                == SEED_PUBLIC_REPORT_IDS.len() as i64,
        ));

        for contract in SEED_ACCOUNTS {
            let account_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ?1 AND role = ?2)",
            )
            .bind(contract.email)
            .bind(contract.role.as_str())
            .fetch_one(pool)
            .await?;
            checks.push((contract.email, account_ok == 1));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the seeded rows. Rows created outside the contract are kept.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let request_ids: Vec<&str> =
            SEED_REQUESTS.iter().map(|request| request.request_id).collect();
        let account_emails: Vec<&str> =
            SEED_ACCOUNTS.iter().map(|contract| contract.email).collect();

        let quoted_requests = sql_array_from_ids(&request_ids);
        let quoted_transactions = sql_array_from_ids(SEED_TRANSACTION_IDS);
        let quoted_alerts = sql_array_from_ids(SEED_ALERT_IDS);
        let quoted_reports = sql_array_from_ids(SEED_REPORT_IDS);
        let quoted_public = sql_array_from_ids(SEED_PUBLIC_REPORT_IDS);
        let quoted_accounts = sql_array_from_ids(&account_emails);

        sqlx::query(&format!("DELETE FROM approval_requests WHERE id IN {quoted_requests}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM budget_transactions WHERE id IN {quoted_transactions}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM fraud_alerts WHERE id IN {quoted_alerts}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM whistleblower_reports WHERE id IN {quoted_reports}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM public_reports WHERE id IN {quoted_public}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM accounts WHERE email IN {quoted_accounts}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRequestContract {
    request_id: &'static str,
    status: &'static str,
    entry_count: i64,
    rejection_reason: Option<&'static str>,
    description: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedAccountContract {
    email: &'static str,
    password: &'static str,
    display_name: &'static str,
    role: AccountRole,
    signer_role: Option<SignerRole>,
}

async fn count_by_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<i64, RepositoryError> {
    let quoted = sql_array_from_ids(ids);
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table} WHERE id IN {quoted}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub requests_seeded: Vec<RequestSeedInfo>,
    pub accounts_seeded: usize,
}

#[derive(Debug)]
pub struct RequestSeedInfo {
    pub request_id: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    const TEST_BCRYPT_COST: u32 = 4;

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoDataset::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_contract_and_idempotency() {
        let pool = setup().await;

        let first = DemoDataset::load_with_cost(&pool, TEST_BCRYPT_COST)
            .await
            .expect("load seed fixtures");
        let first_verification = DemoDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "checks: {:?}", first_verification.checks);
        assert_eq!(first.requests_seeded.len(), 5);
        assert_eq!(first.accounts_seeded, 4);

        let second = DemoDataset::load_with_cost(&pool, TEST_BCRYPT_COST)
            .await
            .expect("reload seed fixtures");
        let second_verification =
            DemoDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert!(second_verification.all_present);
        assert_eq!(second.requests_seeded.len(), 5);

        pool.close().await;
    }

    #[tokio::test]
    async fn seeded_demo_accounts_can_authenticate() {
        let pool = setup().await;
        DemoDataset::load_with_cost(&pool, TEST_BCRYPT_COST).await.expect("load seed fixtures");

        let hash: String =
            sqlx::query_scalar("SELECT password_hash FROM accounts WHERE email = ?1")
                .bind("auditor@securegov.example")
                .fetch_one(&pool)
                .await
                .expect("auditor account exists");

        assert!(bcrypt::verify("auditor-demo", &hash).expect("verify"));
        assert!(!bcrypt::verify("wrong-password", &hash).expect("verify"));

        pool.close().await;
    }

    #[tokio::test]
    async fn seeded_rejection_carries_its_reason() {
        let pool = setup().await;
        DemoDataset::load_with_cost(&pool, TEST_BCRYPT_COST).await.expect("load seed fixtures");

        let reason: Option<String> =
            sqlx::query_scalar("SELECT rejection_reason FROM approval_requests WHERE id = 'AP-9823'")
                .fetch_one(&pool)
                .await
                .expect("rejected request exists");
        assert_eq!(
            reason.as_deref(),
            Some("Duplicate payment detected. Similar transaction processed on 2023-09-05.")
        );

        pool.close().await;
    }

    #[tokio::test]
    async fn clean_removes_only_seeded_rows() {
        let pool = setup().await;
        DemoDataset::load_with_cost(&pool, TEST_BCRYPT_COST).await.expect("load seed fixtures");

        sqlx::query(
            "INSERT INTO budget_transactions
                 (id, date, agency, description, amount, status, risk, created_at)
             VALUES ('TR-KEEP', '2023-11-01', 'Border Patrol', 'Unseeded entry', 10000,
                     'approved', 'low', '2023-11-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert unseeded row");

        DemoDataset::clean(&pool).await.expect("clean");

        let seeded_left: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM approval_requests").fetch_one(&pool).await.expect("count");
        assert_eq!(seeded_left, 0);

        let kept: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM budget_transactions WHERE id = 'TR-KEEP'",
        )
        .fetch_one(&pool)
        .await
        .expect("count kept");
        assert_eq!(kept, 1);

        pool.close().await;
    }
}
