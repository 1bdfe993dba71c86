use std::fmt;

use serde::Serialize;

use crate::month::{ScheduledMonth, YearMonth};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Status {
    Executed,
    Pending,
    Cancelled,
    Unknown(String),
}

impl Status {
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_lowercase().as_str() {
            "ejecutado" | "executed" => Status::Executed,
            "pendiente" | "pending" => Status::Pending,
            "cancelado" | "cancelled" | "canceled" => Status::Cancelled,
            _ => Status::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Executed => "executed",
            Status::Pending => "pending",
            Status::Cancelled => "cancelled",
            Status::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceRecord {
    pub site_id: String,
    pub site_name: String,
    pub specialty: String,
    pub priority: String,
    pub contractor: String,
    pub status: Status,
    pub scheduled_month: ScheduledMonth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteMonthCounts {
    pub site_id: String,
    pub site_name: String,
    pub month: YearMonth,
    pub counts: Vec<u32>,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EliminatedSpecialty {
    pub specialty: String,
    pub historical_max: u32,
    pub current: u32,
    pub lost: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EliminationRecord {
    pub site_id: String,
    pub eliminated: Vec<EliminatedSpecialty>,
    pub maintenances_lost: u32,
}

impl EliminationRecord {
    pub fn has_eliminations(&self) -> bool {
        !self.eliminated.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendState {
    Growing,
    Stable,
    Declining,
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrendState::Growing => "growing",
            TrendState::Stable => "stable",
            TrendState::Declining => "declining",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRecord {
    pub site_id: String,
    pub state: TrendState,
    pub delta_vs_previous_month: i64,
    pub latest_month_total: u32,
    pub historical_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthOverMonth {
    pub site_id: String,
    pub current_total: u32,
    pub previous_total: u32,
    pub difference: i64,
    pub alert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionRatio {
    pub executed: usize,
    pub scheduled: usize,
}

impl fmt::Display for ExecutionRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.executed, self.scheduled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAlert {
    pub site_id: String,
    pub site_name: String,
    pub specialty: String,
    pub pending_month: ScheduledMonth,
    pub next_month: ScheduledMonth,
    pub months_between: i64,
    pub days_without_execution: i64,
    pub next_status: Status,
    pub severity: Severity,
    pub pending_month_ratio: ExecutionRatio,
    pub next_month_ratio: ExecutionRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub site_id: String,
    pub site_name: String,
    pub tier: RiskTier,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractorSummary {
    pub contractor: String,
    pub sites_served: usize,
    pub total: usize,
    pub executed: usize,
    pub executed_pct: f64,
    pub pending: usize,
    pub pending_pct: f64,
    pub cancelled: usize,
    pub cancelled_pct: f64,
    pub problematic: bool,
}
