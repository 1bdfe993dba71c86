use std::fmt::Write;

use chrono::NaiveDate;

use crate::audit::AuditResults;
use crate::models::{RiskTier, TrendState};

pub fn build_report(source: &str, generated_on: NaiveDate, results: &AuditResults) -> String {
    let mut output = String::new();
    let metrics = &results.metrics;

    let _ = writeln!(output, "# Preventive Maintenance Compliance Audit");
    let _ = writeln!(output, "Generated on {} from {}", generated_on, source);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Global Metrics");
    let _ = writeln!(output, "- Sites: {}", metrics.total_sites);
    let _ = writeln!(output, "- Execution rate: {:.1}%", metrics.execution_rate);
    let _ = writeln!(
        output,
        "- Sites with eliminated specialties: {}",
        metrics.sites_with_eliminations
    );
    let _ = writeln!(output, "- Unresolved pending items: {}", metrics.pending_alerts);
    let _ = writeln!(
        output,
        "- Trend: {} declining, {} growing, {} stable",
        metrics.declining_sites, metrics.growing_sites, metrics.stable_sites
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Sites");
    let at_risk: Vec<_> = results
        .risk
        .iter()
        .filter(|r| r.tier != RiskTier::Low)
        .collect();
    if at_risk.is_empty() {
        let _ = writeln!(output, "No sites above low risk.");
    } else {
        for assessment in at_risk.iter().take(20) {
            let _ = writeln!(
                output,
                "- {} ({}) {} risk, score {}",
                assessment.site_id, assessment.site_name, assessment.tier, assessment.score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sites by Priority");
    if results.priorities.iter().all(|p| p.flagged.is_empty()) {
        let _ = writeln!(output, "No flagged sites in any priority.");
    }
    for group in results.priorities.iter().filter(|p| !p.flagged.is_empty()) {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "### {} ({} of {} sites flagged)",
            group.priority,
            group.flagged.len(),
            group.site_count
        );
        for site in &group.flagged {
            let declining = site.trend == Some(TrendState::Declining);
            let problem = match (site.eliminated.is_empty(), declining) {
                (false, true) => format!(
                    "{} maintenances lost, fewer maintenances this month",
                    site.maintenances_lost
                ),
                (false, false) => format!("{} maintenances lost", site.maintenances_lost),
                (true, _) => "fewer maintenances this month".to_string(),
            };
            let _ = writeln!(
                output,
                "- {} risk | {} ({}): {}",
                site.risk_tier, site.site_id, site.site_name, problem
            );
            if let (Some(trend), Some(delta)) = (site.trend, site.delta_vs_previous_month) {
                let _ = writeln!(output, "  - trend {} ({:+} vs previous month)", trend, delta);
            }
            if let Some(latest) = results.monthly.site(&site.site_id).last() {
                let _ = writeln!(
                    output,
                    "  - last executed month {} with {} maintenances",
                    latest.month, latest.total
                );
            }
            for eliminated in &site.eliminated {
                let _ = writeln!(
                    output,
                    "  - {}: {} lost (max {}, current {})",
                    eliminated.specialty, eliminated.lost, eliminated.historical_max, eliminated.current
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Unresolved Pending Maintenance");
    if results.pending_alerts.is_empty() {
        let _ = writeln!(output, "No pending maintenance left unexecuted.");
    } else {
        let _ = writeln!(
            output,
            "| Site | Specialty | Pending | Executed | Next | Executed | Months | Next status | Severity |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for alert in &results.pending_alerts {
            let _ = writeln!(
                output,
                "| {} ({}) | {} | {} | {} | {} | {} | {} | {} | {} |",
                alert.site_id,
                alert.site_name,
                alert.specialty,
                alert.pending_month,
                alert.pending_month_ratio,
                alert.next_month,
                alert.next_month_ratio,
                alert.months_between,
                alert.next_status,
                alert.severity
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Contractor Performance");
    if results.contractors.is_empty() {
        let _ = writeln!(output, "No contractor records.");
    } else {
        for summary in &results.contractors {
            let flag = if summary.problematic { " (problematic)" } else { "" };
            let _ = writeln!(
                output,
                "- {}{}: {} sites, {} records, {:.1}% executed, {:.1}% pending, {:.1}% cancelled",
                summary.contractor,
                flag,
                summary.sites_served,
                summary.total,
                summary.executed_pct,
                summary.pending_pct,
                summary.cancelled_pct
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Specialties");
    for summary in results.specialties.iter().filter(|s| s.total > 0) {
        let _ = writeln!(
            output,
            "- {}: {} records ({:.1}% executed), eliminated at {} sites",
            summary.specialty,
            summary.total,
            summary.executed_pct,
            summary.eliminated_at.len()
        );
    }

    output
}
