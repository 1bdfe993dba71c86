use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::AuditConfig;
use crate::error::LedgerError;
use crate::models::{MaintenanceRecord, Status};
use crate::month::ScheduledMonth;

/// Immutable snapshot of the maintenance ledger.
///
/// Records keep their ingestion order, which breaks ties in every ordering
/// the audit performs. Site names are indexed by site id on construction,
/// first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<MaintenanceRecord>,
    sites: BTreeMap<String, String>,
}

impl Ledger {
    pub fn new(records: Vec<MaintenanceRecord>) -> Self {
        let mut sites = BTreeMap::new();
        let mut unknown_status = 0usize;
        let mut unknown_month = 0usize;

        for record in &records {
            sites
                .entry(record.site_id.clone())
                .or_insert_with(|| record.site_name.clone());
            if matches!(record.status, Status::Unknown(_)) {
                unknown_status += 1;
            }
            if record.scheduled_month == ScheduledMonth::Unknown {
                unknown_month += 1;
            }
        }

        if unknown_status > 0 {
            warn!(records = unknown_status, "Ledger rows with unrecognized status");
        }
        if unknown_month > 0 {
            warn!(records = unknown_month, "Ledger rows with unknown scheduled month");
        }
        debug!(records = records.len(), sites = sites.len(), "Ledger loaded");

        Self { records, sites }
    }

    pub fn from_csv_path(path: &Path, config: &AuditConfig) -> Result<Self, LedgerError> {
        let file =
            std::fs::File::open(path).map_err(|e| LedgerError::Io(path.to_path_buf(), e))?;
        Self::from_csv_reader(file, config)
    }

    /// Reads a ledger CSV whose headers are named by `config.columns`.
    /// Fails before reading any row when a required column is absent.
    pub fn from_csv_reader<R: Read>(reader: R, config: &AuditConfig) -> Result<Self, LedgerError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let position = |column: &str| -> Result<usize, LedgerError> {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| LedgerError::MissingColumn {
                    column: column.to_string(),
                })
        };

        let columns = &config.columns;
        let site_id = position(columns.site_id.as_str())?;
        let site_name = position(columns.site_name.as_str())?;
        let specialty = position(columns.specialty.as_str())?;
        let priority = position(columns.priority.as_str())?;
        let contractor = position(columns.contractor.as_str())?;
        let status = position(columns.status.as_str())?;
        let month = position(columns.scheduled_month.as_str())?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let field = |index: usize| row.get(index).unwrap_or("").trim().to_string();
            records.push(MaintenanceRecord {
                site_id: field(site_id),
                site_name: field(site_name),
                specialty: field(specialty),
                priority: field(priority),
                contractor: field(contractor),
                status: Status::normalize(&field(status)),
                scheduled_month: ScheduledMonth::parse(&field(month), &config.month_names),
            });
        }

        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[MaintenanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn site_ids(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    pub fn site_name<'a>(&'a self, site_id: &'a str) -> &'a str {
        self.sites.get(site_id).map(String::as_str).unwrap_or(site_id)
    }
}
