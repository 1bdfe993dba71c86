use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{aggregate_monthly, MonthlyCounts};
use crate::config::AuditConfig;
use crate::contractor::{percentage, summarize_contractors};
use crate::decline::detect_eliminations;
use crate::ledger::Ledger;
use crate::models::{
    ContractorSummary, EliminatedSpecialty, EliminationRecord, MonthOverMonth, PendingAlert,
    RiskAssessment, RiskTier, Status, TrendRecord, TrendState,
};
use crate::pending::match_pending;
use crate::risk::score_sites;
use crate::trend::{classify_trends, month_over_month};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalMetrics {
    pub total_sites: usize,
    pub total_records: usize,
    pub execution_rate: f64,
    pub sites_with_eliminations: usize,
    pub pending_alerts: usize,
    pub growing_sites: usize,
    pub stable_sites: usize,
    pub declining_sites: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedSite {
    pub site_id: String,
    pub site_name: String,
    pub risk_tier: RiskTier,
    pub risk_score: i64,
    pub maintenances_lost: u32,
    pub trend: Option<TrendState>,
    pub delta_vs_previous_month: Option<i64>,
    pub eliminated: Vec<EliminatedSpecialty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityGroup {
    pub priority: String,
    pub site_count: usize,
    pub flagged: Vec<FlaggedSite>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialtySummary {
    pub specialty: String,
    pub total: usize,
    pub executed: usize,
    pub executed_pct: f64,
    pub pending: usize,
    pub pending_pct: f64,
    pub cancelled: usize,
    pub cancelled_pct: f64,
    pub eliminated_at: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResults {
    pub metrics: GlobalMetrics,
    pub monthly: MonthlyCounts,
    pub eliminations: Vec<EliminationRecord>,
    pub trends: Vec<TrendRecord>,
    pub month_over_month: Vec<MonthOverMonth>,
    pub pending_alerts: Vec<PendingAlert>,
    pub contractors: Vec<ContractorSummary>,
    pub risk: Vec<RiskAssessment>,
    pub priorities: Vec<PriorityGroup>,
    pub specialties: Vec<SpecialtySummary>,
}

impl AuditResults {
    pub fn trend(&self, site_id: &str) -> Option<&TrendRecord> {
        self.trends.iter().find(|t| t.site_id == site_id)
    }
}

pub fn run_audit(ledger: &Ledger, config: &AuditConfig) -> AuditResults {
    let thresholds = &config.thresholds;
    if ledger.is_empty() {
        warn!("Ledger is empty, every result will be empty");
    }

    let monthly = aggregate_monthly(ledger, config);
    let eliminations = detect_eliminations(&monthly, config);
    let trends = classify_trends(&monthly, thresholds);
    let month_over_month = month_over_month(&monthly);
    let pending_alerts = match_pending(ledger, thresholds);
    let contractors = summarize_contractors(ledger, thresholds);
    let risk = score_sites(ledger, &eliminations, &trends, thresholds);

    let metrics = global_metrics(ledger, &eliminations, &trends, pending_alerts.len());
    let priorities = priority_groups(ledger, &eliminations, &trends, &risk);
    let specialties = specialty_summaries(ledger, config, &eliminations);

    info!(
        records = ledger.len(),
        sites = metrics.total_sites,
        eliminated_sites = metrics.sites_with_eliminations,
        pending_alerts = metrics.pending_alerts,
        "Audit complete"
    );

    AuditResults {
        metrics,
        monthly,
        eliminations,
        trends,
        month_over_month,
        pending_alerts,
        contractors,
        risk,
        priorities,
        specialties,
    }
}

fn global_metrics(
    ledger: &Ledger,
    eliminations: &[EliminationRecord],
    trends: &[TrendRecord],
    pending_alerts: usize,
) -> GlobalMetrics {
    let executed = ledger
        .records()
        .iter()
        .filter(|r| r.status == Status::Executed)
        .count();
    let count_state = |state: TrendState| trends.iter().filter(|t| t.state == state).count();

    GlobalMetrics {
        total_sites: ledger.site_count(),
        total_records: ledger.len(),
        execution_rate: percentage(executed, ledger.len()),
        sites_with_eliminations: eliminations.iter().filter(|e| e.has_eliminations()).count(),
        pending_alerts,
        growing_sites: count_state(TrendState::Growing),
        stable_sites: count_state(TrendState::Stable),
        declining_sites: count_state(TrendState::Declining),
    }
}

fn priority_groups(
    ledger: &Ledger,
    eliminations: &[EliminationRecord],
    trends: &[TrendRecord],
    risk: &[RiskAssessment],
) -> Vec<PriorityGroup> {
    let mut by_priority: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in ledger.records() {
        by_priority
            .entry(record.priority.as_str())
            .or_default()
            .insert(record.site_id.as_str());
    }

    let eliminations: HashMap<&str, &EliminationRecord> =
        eliminations.iter().map(|e| (e.site_id.as_str(), e)).collect();
    let trends: HashMap<&str, &TrendRecord> =
        trends.iter().map(|t| (t.site_id.as_str(), t)).collect();
    let risk: HashMap<&str, &RiskAssessment> =
        risk.iter().map(|r| (r.site_id.as_str(), r)).collect();

    by_priority
        .into_iter()
        .map(|(priority, sites)| {
            let flagged = sites
                .iter()
                .filter_map(|&site_id| {
                    let elimination = eliminations.get(site_id).copied();
                    let trend = trends.get(site_id).copied();
                    let has_eliminations = elimination.is_some_and(|e| e.has_eliminations());
                    let declining = trend.is_some_and(|t| t.state == TrendState::Declining);
                    if !has_eliminations && !declining {
                        return None;
                    }
                    let assessment = risk.get(site_id).copied();
                    Some(FlaggedSite {
                        site_id: site_id.to_string(),
                        site_name: ledger.site_name(site_id).to_string(),
                        risk_tier: assessment.map(|r| r.tier).unwrap_or(RiskTier::Low),
                        risk_score: assessment.map(|r| r.score).unwrap_or(0),
                        maintenances_lost: elimination.map(|e| e.maintenances_lost).unwrap_or(0),
                        trend: trend.map(|t| t.state),
                        delta_vs_previous_month: trend.map(|t| t.delta_vs_previous_month),
                        eliminated: elimination.map(|e| e.eliminated.clone()).unwrap_or_default(),
                    })
                })
                .collect();
            PriorityGroup {
                priority: priority.to_string(),
                site_count: sites.len(),
                flagged,
            }
        })
        .collect()
}

fn specialty_summaries(
    ledger: &Ledger,
    config: &AuditConfig,
    eliminations: &[EliminationRecord],
) -> Vec<SpecialtySummary> {
    config
        .specialties
        .iter()
        .map(|specialty| {
            let mut total = 0;
            let mut executed = 0;
            let mut pending = 0;
            let mut cancelled = 0;
            for record in ledger.records().iter().filter(|r| &r.specialty == specialty) {
                total += 1;
                match record.status {
                    Status::Executed => executed += 1,
                    Status::Pending => pending += 1,
                    Status::Cancelled => cancelled += 1,
                    Status::Unknown(_) => {}
                }
            }
            let eliminated_at = eliminations
                .iter()
                .filter(|e| e.eliminated.iter().any(|s| &s.specialty == specialty))
                .map(|e| e.site_id.clone())
                .collect();

            SpecialtySummary {
                specialty: specialty.clone(),
                total,
                executed,
                executed_pct: percentage(executed, total),
                pending,
                pending_pct: percentage(pending, total),
                cancelled,
                cancelled_pct: percentage(cancelled, total),
                eliminated_at,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::tests::record;
    use crate::models::MaintenanceRecord;

    fn risk_of<'a>(results: &'a AuditResults, site_id: &str) -> &'a RiskAssessment {
        results.risk.iter().find(|r| r.site_id == site_id).unwrap()
    }

    fn fleet() -> Ledger {
        let mut records: Vec<MaintenanceRecord> = Vec::new();
        // S1 loses AA after January and drops in the last month.
        for (month, aa, ie) in [
            ("2024-01", 4, 2),
            ("2024-02", 1, 2),
            ("2024-03", 1, 2),
            ("2024-04", 1, 1),
        ] {
            records.extend((0..aa).map(|_| record("S1", "AA", "Ejecutado", month)));
            records.extend((0..ie).map(|_| record("S1", "IE", "Ejecutado", month)));
        }
        // S2 is steady with one unresolved pending item.
        for month in ["2024-01", "2024-02", "2024-03", "2024-04"] {
            records.push(record("S2", "UPS", "Ejecutado", month));
        }
        records.push(record("S2", "TX", "Pendiente", "2024-01"));
        records.push(record("S2", "TX", "Pendiente", "2024-04"));
        // S3 never executed anything.
        let mut idle = record("S3", "AA", "Cancelado", "2024-02");
        idle.priority = "B_3".to_string();
        records.push(idle);
        Ledger::new(records)
    }

    #[test]
    fn full_pipeline_on_small_fleet() {
        let results = run_audit(&fleet(), &AuditConfig::default());

        assert_eq!(results.metrics.total_sites, 3);
        assert_eq!(results.metrics.sites_with_eliminations, 1);
        assert_eq!(results.metrics.pending_alerts, 1);

        let s1 = &results.eliminations[0];
        assert_eq!(s1.site_id, "S1");
        assert_eq!(s1.maintenances_lost, 3);

        let trend = results.trend("S1").unwrap();
        assert_eq!(trend.delta_vs_previous_month, -1);
        assert_eq!(trend.state, TrendState::Declining);

        // 3 lost + 2 * 1 drop.
        let risk = risk_of(&results, "S1");
        assert_eq!(risk.score, 5);
        assert_eq!(risk.tier, RiskTier::Medium);
        assert_eq!(results.risk[0].site_id, "S1");
        assert_eq!(risk_of(&results, "S3").tier, RiskTier::Low);

        let alert = &results.pending_alerts[0];
        assert_eq!(alert.site_id, "S2");
        assert_eq!(alert.months_between, 3);
    }

    #[test]
    fn priority_groups_list_only_flagged_sites() {
        let results = run_audit(&fleet(), &AuditConfig::default());
        let priorities: Vec<&str> = results.priorities.iter().map(|p| p.priority.as_str()).collect();
        assert_eq!(priorities, vec!["B_3", "P_1"]);

        let p1 = &results.priorities[1];
        assert_eq!(p1.site_count, 2);
        assert_eq!(p1.flagged.len(), 1);
        assert_eq!(p1.flagged[0].site_id, "S1");
        assert_eq!(p1.flagged[0].eliminated[0].specialty, "AA");
        assert!(results.priorities[0].flagged.is_empty());
    }

    #[test]
    fn specialty_summary_counts_statuses() {
        let results = run_audit(&fleet(), &AuditConfig::default());
        let aa = results.specialties.iter().find(|s| s.specialty == "AA").unwrap();
        assert_eq!(aa.total, 8);
        assert_eq!(aa.executed, 7);
        assert_eq!(aa.cancelled, 1);
        assert_eq!(aa.eliminated_at, vec!["S1".to_string()]);
    }

    #[test]
    fn rerun_serializes_identically() {
        let ledger = fleet();
        let config = AuditConfig::default();
        let first = serde_json::to_string(&run_audit(&ledger, &config)).unwrap();
        let second = serde_json::to_string(&run_audit(&ledger, &config)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn derived_sites_come_from_the_ledger() {
        let ledger = fleet();
        let results = run_audit(&ledger, &AuditConfig::default());
        let derived = results
            .monthly
            .rows
            .iter()
            .map(|r| r.site_id.as_str())
            .chain(results.eliminations.iter().map(|e| e.site_id.as_str()))
            .chain(results.trends.iter().map(|t| t.site_id.as_str()))
            .chain(results.pending_alerts.iter().map(|a| a.site_id.as_str()))
            .chain(results.risk.iter().map(|r| r.site_id.as_str()));
        for site_id in derived {
            assert!(
                ledger.site_ids().any(|known| known == site_id),
                "{site_id} not in ledger"
            );
        }
    }

    #[test]
    fn empty_ledger_yields_empty_results() {
        let results = run_audit(&Ledger::default(), &AuditConfig::default());
        assert_eq!(results.metrics.total_sites, 0);
        assert_eq!(results.metrics.execution_rate, 0.0);
        assert!(results.risk.is_empty());
        assert!(results.pending_alerts.is_empty());
        assert!(results.contractors.is_empty());
        assert!(results.priorities.is_empty());
    }
}
