use tracing::debug;

use crate::aggregate::MonthlyCounts;
use crate::config::Thresholds;
use crate::models::{MonthOverMonth, TrendRecord, TrendState};

/// Classifies the latest month of a totals series against the site's own
/// history. `None` when the history is shorter than `trend_min_months`.
pub fn classify_totals(totals: &[u32], thresholds: &Thresholds) -> Option<(TrendState, i64, f64)> {
    if totals.len() < thresholds.trend_min_months.max(2) {
        return None;
    }

    let (&latest, history) = totals.split_last()?;
    let previous = history.last().copied()?;
    let delta = i64::from(latest) - i64::from(previous);
    let historical_average =
        history.iter().map(|&t| f64::from(t)).sum::<f64>() / history.len() as f64;
    let stable_floor = thresholds.stable_ratio * historical_average;

    let window = thresholds.flat_window;
    let flat = window > 0
        && totals.len() >= window
        && totals[totals.len() - window..].windows(2).all(|w| w[0] == w[1]);

    let latest = f64::from(latest);
    let state = if flat {
        TrendState::Stable
    } else if latest >= historical_average {
        TrendState::Growing
    } else if latest >= stable_floor {
        TrendState::Stable
    } else {
        TrendState::Declining
    };

    Some((state, delta, historical_average))
}

pub fn classify_trends(monthly: &MonthlyCounts, thresholds: &Thresholds) -> Vec<TrendRecord> {
    let mut trends = Vec::new();

    for (site_id, rows) in monthly.sites() {
        let totals: Vec<u32> = rows.iter().map(|row| row.total).collect();
        let Some((state, delta, historical_average)) = classify_totals(&totals, thresholds) else {
            continue;
        };
        trends.push(TrendRecord {
            site_id: site_id.to_string(),
            state,
            delta_vs_previous_month: delta,
            latest_month_total: totals.last().copied().unwrap_or(0),
            historical_average,
        });
    }

    debug!(sites = trends.len(), "Site trends classified");
    trends
}

pub fn month_over_month(monthly: &MonthlyCounts) -> Vec<MonthOverMonth> {
    monthly
        .sites()
        .map(|(site_id, rows)| {
            let current_total = rows.last().map(|row| row.total).unwrap_or(0);
            let previous_total = if rows.len() >= 2 {
                rows[rows.len() - 2].total
            } else {
                0
            };
            let difference = if rows.len() >= 2 {
                i64::from(current_total) - i64::from(previous_total)
            } else {
                0
            };
            MonthOverMonth {
                site_id: site_id.to_string(),
                current_total,
                previous_total,
                difference,
                alert: difference < 0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_monthly;
    use crate::config::AuditConfig;
    use crate::ledger::tests::record;
    use crate::ledger::Ledger;

    fn state(totals: &[u32]) -> Option<TrendState> {
        classify_totals(totals, &Thresholds::default()).map(|(state, _, _)| state)
    }

    #[test]
    fn flat_tail_is_stable() {
        assert_eq!(state(&[12, 12, 12, 12]), Some(TrendState::Stable));
        // Flat override wins even when the latest month is under 80%.
        assert_eq!(state(&[40, 40, 5, 5, 5]), Some(TrendState::Stable));
    }

    #[test]
    fn disabled_flat_window_falls_through_to_average() {
        let thresholds = Thresholds {
            flat_window: 0,
            ..Thresholds::default()
        };
        let (state, _, _) = classify_totals(&[40, 40, 5, 5, 5], &thresholds).unwrap();
        assert_eq!(state, TrendState::Declining);
    }

    #[test]
    fn steep_drop_is_declining() {
        let (state, delta, average) = classify_totals(&[10, 4], &Thresholds::default()).unwrap();
        assert_eq!(state, TrendState::Declining);
        assert_eq!(delta, -6);
        assert!((average - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn mild_drop_is_stable() {
        assert_eq!(state(&[10, 9]), Some(TrendState::Stable));
    }

    #[test]
    fn at_or_above_average_is_growing() {
        assert_eq!(state(&[4, 8, 6]), Some(TrendState::Growing));
        assert_eq!(state(&[5, 5]), Some(TrendState::Growing));
    }

    #[test]
    fn single_month_has_no_trend() {
        assert_eq!(state(&[7]), None);
        assert_eq!(state(&[]), None);
    }

    #[test]
    fn delta_is_recorded_when_stable() {
        let (_, delta, _) = classify_totals(&[12, 12, 12, 12], &Thresholds::default()).unwrap();
        assert_eq!(delta, 0);
        let (state, delta, _) = classify_totals(&[10, 9], &Thresholds::default()).unwrap();
        assert_eq!(state, TrendState::Stable);
        assert_eq!(delta, -1);
    }

    #[test]
    fn sites_need_two_months() {
        let ledger = Ledger::new(vec![
            record("S1", "AA", "Ejecutado", "2024-01"),
            record("S1", "AA", "Ejecutado", "2024-01"),
            record("S1", "AA", "Ejecutado", "2024-02"),
            record("S2", "AA", "Ejecutado", "2024-02"),
        ]);
        let config = AuditConfig::default();
        let monthly = aggregate_monthly(&ledger, &config);

        let trends = classify_trends(&monthly, &config.thresholds);
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].site_id, "S1");
        assert_eq!(trends[0].state, TrendState::Declining);
        assert_eq!(trends[0].latest_month_total, 1);

        let changes = month_over_month(&monthly);
        assert_eq!(changes.len(), 2);
        assert!(changes[0].alert);
        assert_eq!(changes[1].difference, 0);
        assert_eq!(changes[1].previous_total, 0);
    }
}
