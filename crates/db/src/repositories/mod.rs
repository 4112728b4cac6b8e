use async_trait::async_trait;
use thiserror::Error;

use securegov_core::approvals::{DecisionError, DecisionInput, DecisionOutcome};
use securegov_core::domain::account::Account;
use securegov_core::domain::analytics::{
    ActivityEntry, AgencyAllocation, BudgetSummary, FraudPatternCount, MonthlyAlertCount,
    MonthlyBudget,
};
use securegov_core::domain::approval::{ApprovalRequest, RequestId};
use securegov_core::domain::disclosure::{ReportStatus, WhistleblowerReport};
use securegov_core::domain::fraud::FraudAlert;
use securegov_core::domain::publication::{PublicReport, PublicReportKind};
use securegov_core::domain::transaction::BudgetTransaction;

pub mod account;
pub mod analytics;
pub mod approval;
pub mod audit;
pub mod disclosure;
pub mod fraud;
pub mod memory;
pub mod publication;
pub mod transaction;

pub use account::SqlAccountRepository;
pub use analytics::SqlAnalyticsRepository;
pub use approval::SqlApprovalRepository;
pub use audit::SqlAuditEventStore;
pub use disclosure::SqlDisclosureRepository;
pub use fraud::SqlFraudAlertRepository;
pub use memory::{InMemoryAccountRepository, InMemoryApprovalRepository};
pub use publication::SqlPublicationRepository;
pub use transaction::SqlTransactionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Storage for two-signer approval requests. `apply_decision` owns the whole
/// read-apply-persist cycle so concurrent deciders on the same request cannot
/// interleave partial writes.
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// All requests, newest filing date first; ties break on ascending id.
    async fn list(&self) -> Result<Vec<ApprovalRequest>, RepositoryError>;

    async fn find_by_id(&self, id: &RequestId)
        -> Result<Option<ApprovalRequest>, RepositoryError>;

    async fn apply_decision(
        &self,
        id: &RequestId,
        input: &DecisionInput,
    ) -> Result<DecisionOutcome, DecisionError>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<BudgetTransaction>, RepositoryError>;
    async fn insert(&self, transaction: BudgetTransaction) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait FraudAlertRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<FraudAlert>, RepositoryError>;
}

#[async_trait]
pub trait DisclosureRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<WhistleblowerReport>, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<WhistleblowerReport>, RepositoryError>;

    async fn insert(&self, report: WhistleblowerReport) -> Result<(), RepositoryError>;

    /// Moves a report to `status` and returns the updated row, or `None` when
    /// the id is unknown.
    async fn update_status(
        &self,
        id: &str,
        status: ReportStatus,
    ) -> Result<Option<WhistleblowerReport>, RepositoryError>;
}

#[async_trait]
pub trait PublicationRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<PublicReport>, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<PublicReport>, RepositoryError>;

    async fn list_by_kind(
        &self,
        kind: PublicReportKind,
    ) -> Result<Vec<PublicReport>, RepositoryError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;
    async fn insert(&self, account: Account) -> Result<(), RepositoryError>;
}

/// Read-only aggregations over the ledgers. Every method computes from the
/// stored rows at call time; nothing here is cached or precomputed.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn budget_summary(&self) -> Result<BudgetSummary, RepositoryError>;
    async fn budget_allocation(&self) -> Result<Vec<AgencyAllocation>, RepositoryError>;
    async fn budget_trends(&self) -> Result<Vec<MonthlyBudget>, RepositoryError>;
    async fn fraud_patterns(&self) -> Result<Vec<FraudPatternCount>, RepositoryError>;
    async fn fraud_trends(&self) -> Result<Vec<MonthlyAlertCount>, RepositoryError>;
    async fn recent_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>, RepositoryError>;
}
