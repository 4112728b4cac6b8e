use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Headline figures for the budget dashboard. `total` is the appropriated
/// envelope; `allocated` is the sum of recorded transactions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total: Decimal,
    pub allocated: Decimal,
    pub remaining: Decimal,
    #[serde(rename = "utilizationPercentage")]
    pub utilization_percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgencyAllocation {
    pub agency: String,
    pub amount: Decimal,
    pub percentage: f64,
}

/// One month of allocated-versus-spent figures; `month` is `YYYY-MM`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBudget {
    pub month: String,
    pub allocated: Decimal,
    pub spent: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudPatternCount {
    pub pattern: String,
    pub count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAlertCount {
    pub month: String,
    pub alerts: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Transaction,
    Alert,
    Report,
}

/// One row in the cross-ledger activity feed, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub kind: ActivityKind,
    pub date: NaiveDate,
    pub description: String,
    pub agency: Option<String>,
    pub status: String,
}
