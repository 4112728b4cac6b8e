use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::approval::SignerRole;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Admin,
    Citizen,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Citizen => "citizen",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "citizen" => Some(Self::Citizen),
            _ => None,
        }
    }
}

/// A login account. `signer_role` marks the accounts whose sessions may
/// record approval decisions for that role; it is unrelated to `role`,
/// which gates the administrative surfaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: AccountRole,
    pub signer_role: Option<SignerRole>,
    pub created_at: DateTime<Utc>,
}
