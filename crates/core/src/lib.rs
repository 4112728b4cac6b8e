pub mod approvals;
pub mod audit;
pub mod auth;
pub mod config;
pub mod domain;

pub use approvals::{
    apply_decision, decision_event, derive_overall_status, normalize_entries, DecisionError,
    DecisionInput, DecisionOutcome,
};
pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use auth::{
    issue_session_token, verify_password, verify_session_token, SessionClaims, SessionError,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::account::{Account, AccountRole};
pub use domain::approval::{
    ApprovalRequest, Decision, DecisionStatus, RequestId, RoleApproval, SignerRole,
    StoredApprovalEntry,
};
pub use domain::disclosure::{ReportStatus, WhistleblowerReport};
pub use domain::fraud::{AlertSeverity, FraudAlert};
pub use domain::publication::{PublicReport, PublicReportKind};
pub use domain::transaction::{BudgetTransaction, RiskLevel, TransactionStatus};
