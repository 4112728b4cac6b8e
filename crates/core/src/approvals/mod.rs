//! Decision engine for two-signer approval requests.
//!
//! Every request carries exactly one entry per signer role. The overall
//! status is never stored independently of the entries: it is re-derived
//! after each change so the two can never drift apart.

use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome};
use crate::domain::approval::{
    ApprovalRequest, Decision, DecisionStatus, RoleApproval, SignerRole, StoredApprovalEntry,
};

/// Legacy persisted role label replaced by [`SignerRole::InternationalOrganization`].
const LEGACY_ANTI_CORRUPTION: &str = "Anti-Corruption";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionInput {
    pub role: SignerRole,
    pub decision: Decision,
    pub rejection_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub request: ApprovalRequest,
    pub previous_entry_status: DecisionStatus,
    pub previous_overall_status: DecisionStatus,
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("approval request {id} not found")]
    NotFound { id: String },
    #[error("unknown signer role: {role}")]
    InvalidRole { role: String },
    #[error("invalid decision: {decision} (expected approved or rejected)")]
    InvalidDecision { decision: String },
    #[error("storage failure during {operation}: {message}")]
    Storage { operation: &'static str, message: String },
    #[error("approval request {id} still contended after {attempts} attempts")]
    Contention { id: String, attempts: u32 },
}

/// Overall status is a pure function of the per-role entries.
pub fn derive_overall_status(approvals: &[RoleApproval]) -> DecisionStatus {
    if approvals.iter().any(|entry| entry.status == DecisionStatus::Rejected) {
        return DecisionStatus::Rejected;
    }
    if !approvals.is_empty()
        && approvals.iter().all(|entry| entry.status == DecisionStatus::Approved)
    {
        return DecisionStatus::Approved;
    }
    DecisionStatus::Pending
}

/// Projects raw stored entries into the canonical two-entry shape.
///
/// Rows written by older releases may carry an "Anti-Corruption" entry in
/// place of the International Organization one, extra entries for roles
/// that no longer sign, or status strings we no longer recognise. The
/// projection keeps whatever decisions survive the rename and defaults
/// the rest to pending, so reads never fail on old rows.
pub fn normalize_entries(stored: &[StoredApprovalEntry]) -> Vec<RoleApproval> {
    let auditor = stored
        .iter()
        .find(|entry| SignerRole::parse(&entry.role) == Some(SignerRole::Auditor))
        .map(|entry| RoleApproval {
            role: SignerRole::Auditor,
            status: parse_status_or_pending(&entry.status),
            name: entry.name.clone(),
        })
        .unwrap_or_else(|| RoleApproval::pending(SignerRole::Auditor));

    let canonical_io = stored
        .iter()
        .find(|entry| {
            SignerRole::parse(&entry.role) == Some(SignerRole::InternationalOrganization)
        })
        .map(|entry| RoleApproval {
            role: SignerRole::InternationalOrganization,
            status: parse_status_or_pending(&entry.status),
            name: entry.name.clone(),
        });
    let legacy_io = stored
        .iter()
        .find(|entry| entry.role.trim() == LEGACY_ANTI_CORRUPTION)
        .map(|entry| RoleApproval {
            role: SignerRole::InternationalOrganization,
            status: parse_status_or_pending(&entry.status),
            name: SignerRole::InternationalOrganization.default_signer_name().to_owned(),
        });
    let international = canonical_io
        .or(legacy_io)
        .unwrap_or_else(|| RoleApproval::pending(SignerRole::InternationalOrganization));

    vec![auditor, international]
}

fn parse_status_or_pending(raw: &str) -> DecisionStatus {
    DecisionStatus::parse(raw).unwrap_or(DecisionStatus::Pending)
}

/// Applies one signer's decision to a request and re-derives the overall
/// status. The entry for the role is replaced in place; the other role's
/// entry is untouched. A rejection reason is only overwritten when the
/// input carries a non-empty one, so an auditor's reason survives a later
/// decision by the other signer.
pub fn apply_decision(mut request: ApprovalRequest, input: &DecisionInput) -> DecisionOutcome {
    let previous_overall_status = request.status;
    let mut previous_entry_status = DecisionStatus::Pending;

    for entry in &mut request.approvals {
        if entry.role == input.role {
            previous_entry_status = entry.status;
            entry.status = input.decision.as_status();
        }
    }

    request.status = derive_overall_status(&request.approvals);
    request.rejection_reason = input
        .rejection_reason
        .as_deref()
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .map(str::to_owned)
        .or(request.rejection_reason);

    DecisionOutcome { request, previous_entry_status, previous_overall_status }
}

/// Audit trail entry for a decision transition. Callers persist the
/// decision first, then emit or record the event.
pub fn decision_event(
    outcome: &DecisionOutcome,
    input: &DecisionInput,
    context: &AuditContext,
) -> AuditEvent {
    let context =
        AuditContext { request_id: Some(outcome.request.id.clone()), ..context.clone() };
    AuditEvent::new(
        context,
        "approval.decision_applied",
        AuditCategory::Decision,
        AuditOutcome::Success,
    )
    .with_metadata("role", input.role.as_str())
    .with_metadata("decision", input.decision.as_status().as_str())
    .with_metadata("entry_status_before", outcome.previous_entry_status.as_str())
    .with_metadata("overall_status_before", outcome.previous_overall_status.as_str())
    .with_metadata("overall_status_after", outcome.request.status.as_str())
}
