use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Medium,
    Low,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// An anomaly raised against a budget transaction. `risk_score` is an
/// externally supplied 0-100 figure; this system stores and surfaces it
/// without recomputing it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudAlert {
    pub id: String,
    pub date: NaiveDate,
    pub agency: String,
    pub description: String,
    pub amount: Decimal,
    pub risk_score: i64,
    pub severity: AlertSeverity,
    pub pattern: String,
    pub created_at: DateTime<Utc>,
}
