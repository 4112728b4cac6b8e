use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicReportKind {
    Financial,
    Audit,
    Sustainability,
}

impl PublicReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Financial => "financial",
            Self::Audit => "audit",
            Self::Sustainability => "sustainability",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "financial" => Some(Self::Financial),
            "audit" => Some(Self::Audit),
            "sustainability" => Some(Self::Sustainability),
            _ => None,
        }
    }
}

/// A published document citizens can download; the file itself lives at
/// `file_url`, outside this system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicReport {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub kind: PublicReportKind,
    pub format: String,
    pub size: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}
