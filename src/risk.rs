use std::collections::HashMap;

use crate::config::Thresholds;
use crate::ledger::Ledger;
use crate::models::{EliminationRecord, RiskAssessment, RiskTier, TrendRecord};

pub fn risk_score(maintenances_lost: u32, delta: i64, thresholds: &Thresholds) -> i64 {
    let drop_penalty = if delta < 0 {
        thresholds.drop_weight * delta.abs()
    } else {
        0
    };
    i64::from(maintenances_lost) + drop_penalty
}

pub fn risk_tier(score: i64, thresholds: &Thresholds) -> RiskTier {
    if score >= thresholds.risk_high {
        RiskTier::High
    } else if score >= thresholds.risk_medium {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

pub fn score_sites(
    ledger: &Ledger,
    eliminations: &[EliminationRecord],
    trends: &[TrendRecord],
    thresholds: &Thresholds,
) -> Vec<RiskAssessment> {
    let lost: HashMap<&str, u32> = eliminations
        .iter()
        .map(|e| (e.site_id.as_str(), e.maintenances_lost))
        .collect();
    let deltas: HashMap<&str, i64> = trends
        .iter()
        .map(|t| (t.site_id.as_str(), t.delta_vs_previous_month))
        .collect();

    let mut scores: Vec<RiskAssessment> = ledger
        .site_ids()
        .map(|site_id| {
            let score = risk_score(
                lost.get(site_id).copied().unwrap_or(0),
                deltas.get(site_id).copied().unwrap_or(0),
                thresholds,
            );
            RiskAssessment {
                site_id: site_id.to_string(),
                site_name: ledger.site_name(site_id).to_string(),
                tier: risk_tier(score, thresholds),
                score,
            }
        })
        .collect();

    scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.site_id.cmp(&b.site_id)));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::record;
    use crate::models::TrendState;

    fn trend(site_id: &str, delta: i64) -> TrendRecord {
        TrendRecord {
            site_id: site_id.to_string(),
            state: TrendState::Stable,
            delta_vs_previous_month: delta,
            latest_month_total: 0,
            historical_average: 0.0,
        }
    }

    fn elimination(site_id: &str, maintenances_lost: u32) -> EliminationRecord {
        EliminationRecord {
            site_id: site_id.to_string(),
            eliminated: Vec::new(),
            maintenances_lost,
        }
    }

    #[test]
    fn drop_is_weighted_double() {
        let t = Thresholds::default();
        assert_eq!(risk_score(6, -3, &t), 12);
        assert_eq!(risk_tier(12, &t), RiskTier::High);
    }

    #[test]
    fn growth_adds_nothing() {
        let t = Thresholds::default();
        assert_eq!(risk_score(0, 5, &t), 0);
        assert_eq!(risk_tier(0, &t), RiskTier::Low);
    }

    #[test]
    fn tiers_follow_expected_bounds() {
        let t = Thresholds::default();
        assert_eq!(risk_tier(4, &t), RiskTier::Low);
        assert_eq!(risk_tier(5, &t), RiskTier::Medium);
        assert_eq!(risk_tier(9, &t), RiskTier::Medium);
        assert_eq!(risk_tier(10, &t), RiskTier::High);
    }

    #[test]
    fn ranks_every_ledger_site() {
        let ledger = Ledger::new(vec![
            record("A", "AA", "Ejecutado", "2024-01"),
            record("B", "AA", "Ejecutado", "2024-01"),
            record("C", "AA", "Cancelado", "2024-01"),
        ]);
        let scores = score_sites(
            &ledger,
            &[elimination("A", 2), elimination("B", 1)],
            &[trend("B", -2), trend("A", 4)],
            &Thresholds::default(),
        );

        let ranked: Vec<(&str, i64)> = scores.iter().map(|s| (s.site_id.as_str(), s.score)).collect();
        assert_eq!(ranked, vec![("B", 5), ("A", 2), ("C", 0)]);
        assert_eq!(scores[0].tier, RiskTier::Medium);
        assert_eq!(scores[2].site_name, "C name");
    }
}
