use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// The closed set of parties whose sign-off an approval request collects.
///
/// A prior design carried a third role (`Anti-Corruption`); stored records
/// from that era are reprojected by `approvals::normalize_entries` and never
/// surface through this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignerRole {
    #[serde(rename = "Auditor")]
    Auditor,
    #[serde(rename = "International Organization")]
    InternationalOrganization,
}

impl SignerRole {
    pub const ALL: [SignerRole; 2] = [SignerRole::Auditor, SignerRole::InternationalOrganization];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auditor => "Auditor",
            Self::InternationalOrganization => "International Organization",
        }
    }

    /// Lenient boundary parse: trims and ignores ASCII case, so `auditor`
    /// and `Auditor` both resolve. Unknown labels (including the retired
    /// `Anti-Corruption`) return `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auditor" => Some(Self::Auditor),
            "international organization" => Some(Self::InternationalOrganization),
            _ => None,
        }
    }

    /// Placeholder signer name used when a stored record carries no entry
    /// for this role.
    pub fn default_signer_name(&self) -> &'static str {
        match self {
            Self::Auditor => "John Adebayo",
            Self::InternationalOrganization => "International Observer",
        }
    }
}

impl std::fmt::Display for SignerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one signer's entry, and also the overall derived status of a
/// request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signer's verdict: the subset of `DecisionStatus` a decision call may
/// set. `pending` is an initial state, never a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_status(&self) -> DecisionStatus {
        match self {
            Self::Approved => DecisionStatus::Approved,
            Self::Rejected => DecisionStatus::Rejected,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One role's slot in a request's approval sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleApproval {
    pub role: SignerRole,
    pub status: DecisionStatus,
    pub name: String,
}

impl RoleApproval {
    pub fn pending(role: SignerRole) -> Self {
        Self {
            role,
            status: DecisionStatus::Pending,
            name: role.default_signer_name().to_string(),
        }
    }
}

/// The raw persisted shape of one approval entry. `role` and `status` stay
/// strings here because stored rows may predate the closed two-role set;
/// `approvals::normalize_entries` is the only path from this shape into
/// `RoleApproval`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredApprovalEntry {
    pub role: String,
    pub status: String,
    pub name: String,
}

impl StoredApprovalEntry {
    pub fn from_role_approval(approval: &RoleApproval) -> Self {
        Self {
            role: approval.role.as_str().to_string(),
            status: approval.status.as_str().to_string(),
            name: approval.name.clone(),
        }
    }
}

/// One financial transaction awaiting multi-party sign-off.
///
/// `status` is always the derivation of `approvals` (see
/// `approvals::derive_overall_status`); `version` is bumped by every
/// persisted mutation and guards the decision write path against lost
/// updates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: RequestId,
    pub description: String,
    pub agency: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub status: DecisionStatus,
    pub approvals: Vec<RoleApproval>,
    pub rejection_reason: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn role_status(&self, role: SignerRole) -> Option<DecisionStatus> {
        self.approvals.iter().find(|entry| entry.role == role).map(|entry| entry.status)
    }
}

#[cfg(test)]
mod tests {
    use super::{Decision, DecisionStatus, SignerRole};

    #[test]
    fn signer_role_parse_is_case_insensitive_and_trims() {
        assert_eq!(SignerRole::parse(" auditor "), Some(SignerRole::Auditor));
        assert_eq!(
            SignerRole::parse("International Organization"),
            Some(SignerRole::InternationalOrganization)
        );
        assert_eq!(SignerRole::parse("Anti-Corruption"), None);
        assert_eq!(SignerRole::parse("AI Verification"), None);
    }

    #[test]
    fn signer_role_serializes_with_display_labels() {
        let json = serde_json::to_string(&SignerRole::InternationalOrganization)
            .expect("role serializes");
        assert_eq!(json, "\"International Organization\"");
    }

    #[test]
    fn decision_excludes_pending() {
        assert_eq!(Decision::parse("approved"), Some(Decision::Approved));
        assert_eq!(Decision::parse("rejected"), Some(Decision::Rejected));
        assert_eq!(Decision::parse("pending"), None);
        assert_eq!(Decision::Approved.as_status(), DecisionStatus::Approved);
    }
}
