use std::collections::BTreeMap;

use tracing::debug;

use crate::config::Thresholds;
use crate::ledger::Ledger;
use crate::models::{ExecutionRatio, MaintenanceRecord, PendingAlert, Severity, Status};
use crate::month::ScheduledMonth;

const DAYS_PER_MONTH: i64 = 30;

/// Ledger records grouped once by (site, specialty), each group sorted by
/// scheduled month. Equal months keep ledger order.
pub struct OccurrenceIndex<'a> {
    groups: BTreeMap<(&'a str, &'a str), Vec<&'a MaintenanceRecord>>,
}

impl<'a> OccurrenceIndex<'a> {
    pub fn build(ledger: &'a Ledger) -> Self {
        let mut groups: BTreeMap<(&str, &str), Vec<&MaintenanceRecord>> = BTreeMap::new();
        for record in ledger.records() {
            groups
                .entry((record.site_id.as_str(), record.specialty.as_str()))
                .or_default()
                .push(record);
        }
        for sequence in groups.values_mut() {
            sequence.sort_by_key(|record| record.scheduled_month);
        }
        Self { groups }
    }

    pub fn sequences(&self) -> impl Iterator<Item = &[&'a MaintenanceRecord]> {
        self.groups.values().map(Vec::as_slice)
    }
}

fn execution_ratio(sequence: &[&MaintenanceRecord], month: ScheduledMonth) -> ExecutionRatio {
    let mut ratio = ExecutionRatio {
        executed: 0,
        scheduled: 0,
    };
    for record in sequence.iter().filter(|r| r.scheduled_month == month) {
        ratio.scheduled += 1;
        if record.status == Status::Executed {
            ratio.executed += 1;
        }
    }
    ratio
}

pub fn pending_severity(
    next_status: &Status,
    months_between: i64,
    thresholds: &Thresholds,
) -> Option<Severity> {
    match next_status {
        Status::Executed => None,
        Status::Cancelled => Some(Severity::Medium),
        _ if months_between >= thresholds.critical_months => Some(Severity::Critical),
        _ if months_between >= thresholds.high_months => Some(Severity::High),
        _ => Some(Severity::Medium),
    }
}

/// Checks every pending record against the next scheduled occurrence of the
/// same site and specialty.
///
/// No alert is raised when there is no later occurrence, when the next
/// occurrence falls in the same month (or either month is unknown), or when
/// the next occurrence was executed.
pub fn match_pending(ledger: &Ledger, thresholds: &Thresholds) -> Vec<PendingAlert> {
    let index = OccurrenceIndex::build(ledger);
    let mut alerts = Vec::new();
    let mut awaiting = 0usize;

    for sequence in index.sequences() {
        for (position, pending) in sequence.iter().enumerate() {
            if pending.status != Status::Pending {
                continue;
            }
            let Some(next) = sequence.get(position + 1) else {
                awaiting += 1;
                continue;
            };

            let months_between = pending.scheduled_month.months_between(&next.scheduled_month);
            if months_between == 0 {
                continue;
            }
            let Some(severity) = pending_severity(&next.status, months_between, thresholds) else {
                continue;
            };

            alerts.push(PendingAlert {
                site_id: pending.site_id.clone(),
                site_name: pending.site_name.clone(),
                specialty: pending.specialty.clone(),
                pending_month: pending.scheduled_month,
                next_month: next.scheduled_month,
                months_between,
                days_without_execution: months_between * DAYS_PER_MONTH,
                next_status: next.status.clone(),
                severity,
                pending_month_ratio: execution_ratio(sequence, pending.scheduled_month),
                next_month_ratio: execution_ratio(sequence, next.scheduled_month),
            });
        }
    }

    debug!(alerts = alerts.len(), awaiting, "Pending records matched");
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::record;

    fn alerts(records: Vec<MaintenanceRecord>) -> Vec<PendingAlert> {
        match_pending(&Ledger::new(records), &Thresholds::default())
    }

    #[test]
    fn executed_next_occurrence_resolves_pending() {
        let found = alerts(vec![
            record("S", "X", "Pendiente", "2024-01"),
            record("S", "X", "Ejecutado", "2024-02"),
        ]);
        assert!(found.is_empty());
    }

    #[test]
    fn six_months_still_pending_is_critical() {
        let found = alerts(vec![
            record("S", "X", "Pendiente", "2024-01"),
            record("S", "X", "Pendiente", "2024-07"),
        ]);
        assert_eq!(found.len(), 1);
        let alert = &found[0];
        assert_eq!(alert.months_between, 6);
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.days_without_execution, 180);
        assert_eq!(alert.next_status, Status::Pending);
    }

    #[test]
    fn severity_follows_gap_and_outcome() {
        let t = Thresholds::default();
        assert_eq!(pending_severity(&Status::Cancelled, 12, &t), Some(Severity::Medium));
        assert_eq!(pending_severity(&Status::Pending, 5, &t), Some(Severity::High));
        assert_eq!(pending_severity(&Status::Pending, 3, &t), Some(Severity::High));
        assert_eq!(pending_severity(&Status::Pending, 2, &t), Some(Severity::Medium));
        assert_eq!(
            pending_severity(&Status::Unknown("x".into()), 6, &t),
            Some(Severity::Critical)
        );
        assert_eq!(pending_severity(&Status::Executed, 9, &t), None);
    }

    #[test]
    fn last_occurrence_has_no_verdict() {
        let found = alerts(vec![
            record("S", "X", "Ejecutado", "2024-01"),
            record("S", "X", "Pendiente", "2024-03"),
        ]);
        assert!(found.is_empty());
    }

    #[test]
    fn same_month_successor_is_skipped() {
        let found = alerts(vec![
            record("S", "X", "Pendiente", "2024-03"),
            record("S", "X", "Cancelado", "2024-03"),
        ]);
        assert!(found.is_empty());
    }

    #[test]
    fn unknown_month_degrades_to_skip() {
        let found = alerts(vec![
            record("S", "X", "Pendiente", "2024-03"),
            record("S", "X", "Pendiente", "sin fecha"),
        ]);
        assert!(found.is_empty());
    }

    #[test]
    fn matches_within_site_and_specialty_in_month_order() {
        let found = alerts(vec![
            record("S", "X", "Cancelado", "2024-05"),
            record("S", "Y", "Ejecutado", "2024-02"),
            record("T", "X", "Ejecutado", "2024-02"),
            record("S", "X", "Ejecutado", "2024-01"),
            record("S", "X", "Pendiente", "2024-01"),
        ]);
        assert_eq!(found.len(), 1);
        let alert = &found[0];
        assert_eq!(alert.next_month.to_string(), "2024-05");
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.months_between, 4);
        assert_eq!(alert.pending_month_ratio.to_string(), "1/2");
        assert_eq!(alert.next_month_ratio.to_string(), "0/1");
    }

    #[test]
    fn unlisted_specialties_are_still_matched() {
        let found = alerts(vec![
            record("S", "NOT-CONFIGURED", "pending", "2023-11"),
            record("S", "NOT-CONFIGURED", "pending", "2024-02"),
        ]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].months_between, 3);
        assert_eq!(found[0].severity, Severity::High);
    }
}
