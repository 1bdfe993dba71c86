use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Audit configuration, loaded once and passed by reference to every stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Specialties tracked by the monthly aggregate, in report order.
    #[serde(default = "default_specialties")]
    pub specialties: Vec<String>,

    /// Lowercase month abbreviations, January first.
    #[serde(default = "default_month_names")]
    pub month_names: Vec<String>,

    #[serde(default)]
    pub columns: ColumnNames,

    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Header names of the ledger CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub site_id: String,
    pub site_name: String,
    pub specialty: String,
    pub priority: String,
    pub contractor: String,
    pub status: String,
    pub scheduled_month: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            site_id: "Site Id".to_string(),
            site_name: "Site Id Name".to_string(),
            specialty: "SUB_ESPECIALIDAD".to_string(),
            priority: "Site Priority".to_string(),
            contractor: "Contratista Sitio".to_string(),
            status: "ESTADO".to_string(),
            scheduled_month: "2_MES_PROGRA".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Consecutive below-peak months that mark a specialty eliminated.
    pub elimination_streak: usize,
    pub decline_min_months: usize,
    pub trend_min_months: usize,
    /// Share of the historical average below which a site is declining.
    pub stable_ratio: f64,
    /// Trailing months with an identical total that force a stable verdict;
    /// 0 disables the rule.
    pub flat_window: usize,
    pub critical_months: i64,
    pub high_months: i64,
    pub risk_high: i64,
    pub risk_medium: i64,
    /// Multiplier applied to a month-over-month drop.
    pub drop_weight: i64,
    pub contractor_max_cancelled_pct: f64,
    pub contractor_min_executed_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            elimination_streak: 3,
            decline_min_months: 3,
            trend_min_months: 2,
            stable_ratio: 0.8,
            flat_window: 3,
            critical_months: 6,
            high_months: 3,
            risk_high: 10,
            risk_medium: 5,
            drop_weight: 2,
            contractor_max_cancelled_pct: 15.0,
            contractor_min_executed_pct: 70.0,
        }
    }
}

fn default_specialties() -> Vec<String> {
    [
        "AA", "GE-TTA-TK", "IE", "SE-LT", "REC-BB", "TX", "TX-BH", "UPS", "INV-AVR", "LT",
        "RADIO", "SOL-EOL",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_month_names() -> Vec<String> {
    [
        "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "set", "oct", "nov", "dic",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            specialties: default_specialties(),
            month_names: default_month_names(),
            columns: ColumnNames::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl AuditConfig {
    /// Loads config from `path`, or returns defaults when no path is given.
    /// The result is always validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                debug!(config_path = %path.display(), "Loading config");
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
                Self::from_toml(&content)?
            }
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        for name in config.month_names.iter_mut() {
            *name = name.trim().to_lowercase();
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.specialties.is_empty() {
            return Err(ConfigError::EmptySpecialties);
        }
        let mut seen = HashSet::new();
        for specialty in &self.specialties {
            if !seen.insert(specialty.as_str()) {
                return Err(ConfigError::DuplicateSpecialty(specialty.clone()));
            }
        }
        if self.month_names.len() != 12 {
            return Err(ConfigError::InvalidMonthTable(self.month_names.len()));
        }

        let t = &self.thresholds;
        if t.elimination_streak == 0 {
            return Err(invalid("elimination_streak", "must be at least 1"));
        }
        if t.trend_min_months < 2 {
            return Err(invalid("trend_min_months", "a trend needs two months"));
        }
        if t.flat_window == 1 {
            return Err(invalid("flat_window", "must be 0 (disabled) or at least 2"));
        }
        if !(t.stable_ratio > 0.0 && t.stable_ratio <= 1.0) {
            return Err(invalid("stable_ratio", "must be in (0, 1]"));
        }
        if t.high_months > t.critical_months {
            return Err(invalid("high_months", "must not exceed critical_months"));
        }
        if t.risk_medium > t.risk_high {
            return Err(invalid("risk_medium", "must not exceed risk_high"));
        }
        Ok(())
    }

    pub fn specialty_index(&self, specialty: &str) -> Option<usize> {
        self.specialties.iter().position(|s| s == specialty)
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidThreshold {
        name,
        reason: reason.to_string(),
    }
}
