use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use securegov_core::approvals::{self, DecisionError, DecisionInput, DecisionOutcome};
use securegov_core::domain::account::Account;
use securegov_core::domain::approval::{ApprovalRequest, RequestId};

use super::{AccountRepository, ApprovalRepository, RepositoryError};

/// Test double for the approval store. Decisions run under one write lock,
/// so the version discipline of the SQL repository holds here too.
#[derive(Default)]
pub struct InMemoryApprovalRepository {
    requests: RwLock<HashMap<String, ApprovalRequest>>,
}

impl InMemoryApprovalRepository {
    pub async fn insert(&self, request: ApprovalRequest) {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
    }
}

#[async_trait::async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn list(&self) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut all: Vec<ApprovalRequest> = requests.values().cloned().collect();
        all.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(all)
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ApprovalRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn apply_decision(
        &self,
        id: &RequestId,
        input: &DecisionInput,
    ) -> Result<DecisionOutcome, DecisionError> {
        let mut requests = self.requests.write().await;
        let current = requests
            .get(&id.0)
            .cloned()
            .ok_or_else(|| DecisionError::NotFound { id: id.0.clone() })?;

        let expected_version = current.version;
        let mut outcome = approvals::apply_decision(current, input);
        outcome.request.version = expected_version + 1;
        outcome.request.updated_at = Utc::now();
        requests.insert(id.0.clone(), outcome.request.clone());

        Ok(outcome)
    }
}

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<String, Account>>,
}

#[async_trait::async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(email).cloned())
    }

    async fn insert(&self, account: Account) -> Result<(), RepositoryError> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.email.clone(), account);
        Ok(())
    }
}
