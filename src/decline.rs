use tracing::debug;

use crate::aggregate::MonthlyCounts;
use crate::config::AuditConfig;
use crate::models::{EliminatedSpecialty, EliminationRecord};

pub fn below_peak_run(series: &[u32], streak: usize) -> usize {
    let mut running_max = 0u32;
    let mut consecutive = 0usize;
    let mut longest = 0usize;

    for &value in series {
        if value >= running_max {
            running_max = value;
            consecutive = 0;
            continue;
        }
        consecutive += 1;
        longest = longest.max(consecutive);
        if consecutive >= streak {
            break;
        }
    }
    longest
}

pub fn eliminated_loss(series: &[u32], streak: usize, min_months: usize) -> Option<(u32, u32)> {
    if series.len() < min_months {
        return None;
    }
    if below_peak_run(series, streak) < streak {
        return None;
    }
    let historical_max = series.iter().copied().max().unwrap_or(0);
    let current = series.last().copied().unwrap_or(0);
    Some((historical_max, current))
}

pub fn detect_eliminations(monthly: &MonthlyCounts, config: &AuditConfig) -> Vec<EliminationRecord> {
    let thresholds = &config.thresholds;
    let mut records = Vec::new();

    for (site_id, rows) in monthly.sites() {
        let mut eliminated = Vec::new();
        let mut maintenances_lost = 0u32;

        for (index, specialty) in monthly.specialties.iter().enumerate() {
            let series = MonthlyCounts::series(rows, index);
            if let Some((historical_max, current)) = eliminated_loss(
                &series,
                thresholds.elimination_streak,
                thresholds.decline_min_months,
            ) {
                let lost = historical_max - current;
                maintenances_lost += lost;
                eliminated.push(EliminatedSpecialty {
                    specialty: specialty.clone(),
                    historical_max,
                    current,
                    lost,
                });
            }
        }

        if !eliminated.is_empty() {
            debug!(site_id, specialties = eliminated.len(), maintenances_lost, "Eliminated specialties");
        }

        records.push(EliminationRecord {
            site_id: site_id.to_string(),
            eliminated,
            maintenances_lost,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_monthly;
    use crate::ledger::tests::record;
    use crate::ledger::Ledger;

    #[test]
    fn flat_series_is_never_eliminated() {
        assert_eq!(eliminated_loss(&[10, 10, 10], 3, 3), None);
        assert_eq!(below_peak_run(&[10, 10, 10], 3), 0);
    }

    #[test]
    fn three_months_below_peak_eliminates() {
        assert_eq!(eliminated_loss(&[10, 5, 5, 5], 3, 3), Some((10, 5)));
    }

    #[test]
    fn short_series_is_skipped() {
        assert_eq!(eliminated_loss(&[4, 0], 1, 3), None);
    }

    #[test]
    fn recovery_resets_the_run() {
        // Two drops, a return to peak, then two more drops.
        assert_eq!(below_peak_run(&[6, 2, 2, 6, 1, 1], 3), 2);
        assert_eq!(eliminated_loss(&[6, 2, 2, 6, 1, 1], 3, 3), None);
    }

    #[test]
    fn loss_uses_whole_series_not_trigger_window() {
        // Triggered at index 3, then partly recovered without reaching peak.
        assert_eq!(eliminated_loss(&[8, 3, 2, 1, 7], 3, 3), Some((8, 7)));
    }

    #[test]
    fn new_peak_never_extends_the_run() {
        let base = [5, 4, 3];
        let mut extended = base.to_vec();
        extended.push(9);
        assert!(below_peak_run(&extended, 3) <= below_peak_run(&base, 3));
        assert_eq!(eliminated_loss(&extended, 3, 3), None);
    }

    #[test]
    fn accumulates_loss_across_specialties() {
        let mut records = Vec::new();
        for (month, aa, tx) in [("2024-01", 3, 2), ("2024-02", 1, 0), ("2024-03", 1, 0), ("2024-04", 1, 0)] {
            for _ in 0..aa {
                records.push(record("S1", "AA", "Ejecutado", month));
            }
            for _ in 0..tx {
                records.push(record("S1", "TX", "Ejecutado", month));
            }
            records.push(record("S1", "IE", "Ejecutado", month));
        }
        let config = AuditConfig::default();
        let monthly = aggregate_monthly(&Ledger::new(records), &config);
        let eliminations = detect_eliminations(&monthly, &config);

        assert_eq!(eliminations.len(), 1);
        let site = &eliminations[0];
        let names: Vec<&str> = site.eliminated.iter().map(|e| e.specialty.as_str()).collect();
        assert_eq!(names, vec!["AA", "TX"]);
        assert_eq!(site.maintenances_lost, 2 + 2);
    }
}
