use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::config::AuditConfig;
use crate::ledger::Ledger;
use crate::models::{SiteMonthCounts, Status};
use crate::month::YearMonth;

/// Executed-work counts per (site, month), stored as one flat list sorted by
/// site then month, with an index from site id to that site's rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonthlyCounts {
    pub specialties: Vec<String>,
    pub rows: Vec<SiteMonthCounts>,
    #[serde(skip)]
    index: BTreeMap<String, Range<usize>>,
}

impl MonthlyCounts {
    pub fn site(&self, site_id: &str) -> &[SiteMonthCounts] {
        self.index
            .get(site_id)
            .map(|range| &self.rows[range.clone()])
            .unwrap_or(&[])
    }

    pub fn sites(&self) -> impl Iterator<Item = (&str, &[SiteMonthCounts])> {
        self.index
            .iter()
            .map(|(site_id, range)| (site_id.as_str(), &self.rows[range.clone()]))
    }

    pub fn series(rows: &[SiteMonthCounts], specialty: usize) -> Vec<u32> {
        rows.iter().map(|row| row.counts[specialty]).collect()
    }
}

/// Collapses executed records into per-site, per-month specialty counts.
///
/// Records with an unknown month cannot be placed in a series and are
/// left out, as are specialties outside the configured list.
pub fn aggregate_monthly(ledger: &Ledger, config: &AuditConfig) -> MonthlyCounts {
    let width = config.specialties.len();
    let mut grouped: BTreeMap<(&str, YearMonth), (&str, Vec<u32>)> = BTreeMap::new();
    let mut skipped_months = 0usize;

    for record in ledger.records() {
        if record.status != Status::Executed {
            continue;
        }
        let Some(month) = record.scheduled_month.known() else {
            skipped_months += 1;
            continue;
        };
        let Some(specialty) = config.specialty_index(&record.specialty) else {
            continue;
        };
        let entry = grouped
            .entry((record.site_id.as_str(), month))
            .or_insert_with(|| (ledger.site_name(&record.site_id), vec![0; width]));
        entry.1[specialty] += 1;
    }

    let mut rows = Vec::with_capacity(grouped.len());
    let mut index: BTreeMap<String, Range<usize>> = BTreeMap::new();

    for ((site_id, month), (site_name, counts)) in grouped {
        let position = rows.len();
        index
            .entry(site_id.to_string())
            .and_modify(|range| range.end = position + 1)
            .or_insert(position..position + 1);
        rows.push(SiteMonthCounts {
            site_id: site_id.to_string(),
            site_name: site_name.to_string(),
            month,
            total: counts.iter().sum(),
            counts,
        });
    }

    debug!(
        rows = rows.len(),
        sites = index.len(),
        skipped_months,
        "Monthly specialty counts aggregated"
    );

    MonthlyCounts {
        specialties: config.specialties.clone(),
        rows,
        index,
    }
}
