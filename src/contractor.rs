use std::collections::{BTreeMap, BTreeSet};

use crate::config::Thresholds;
use crate::ledger::Ledger;
use crate::models::{ContractorSummary, Status};

pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 100.0 * 10.0).round_ties_even() / 10.0
}

#[derive(Default)]
struct Tally<'a> {
    total: usize,
    executed: usize,
    pending: usize,
    cancelled: usize,
    sites: BTreeSet<&'a str>,
}

pub fn summarize_contractors(ledger: &Ledger, thresholds: &Thresholds) -> Vec<ContractorSummary> {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

    for record in ledger.records() {
        let tally = tallies.entry(record.contractor.as_str()).or_default();
        tally.total += 1;
        tally.sites.insert(record.site_id.as_str());
        match record.status {
            Status::Executed => tally.executed += 1,
            Status::Pending => tally.pending += 1,
            Status::Cancelled => tally.cancelled += 1,
            Status::Unknown(_) => {}
        }
    }

    tallies
        .into_iter()
        .map(|(contractor, tally)| {
            let executed_pct = percentage(tally.executed, tally.total);
            let cancelled_pct = percentage(tally.cancelled, tally.total);
            ContractorSummary {
                contractor: contractor.to_string(),
                sites_served: tally.sites.len(),
                total: tally.total,
                executed: tally.executed,
                executed_pct,
                pending: tally.pending,
                pending_pct: percentage(tally.pending, tally.total),
                cancelled: tally.cancelled,
                cancelled_pct,
                problematic: cancelled_pct > thresholds.contractor_max_cancelled_pct
                    || executed_pct < thresholds.contractor_min_executed_pct,
            }
        })
        .collect()
}
