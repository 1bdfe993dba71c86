use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod aggregate;
mod audit;
mod config;
mod contractor;
mod db;
mod decline;
mod error;
mod ledger;
mod models;
mod month;
mod pending;
mod report;
mod risk;
mod trend;

use config::AuditConfig;
use ledger::Ledger;
use models::Severity;

#[derive(Parser)]
#[command(name = "compliance-audit")]
#[command(about = "Preventive maintenance compliance audit across a site fleet", long_about = None)]
struct Cli {
    /// Read the ledger from a CSV file instead of Postgres
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// TOML file with specialties, column names and thresholds
    #[arg(long, global = true, env = "AUDIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a realistic sample ledger
    Seed,
    /// Import a ledger CSV into Postgres
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run every analysis and print global metrics
    Audit {
        /// Also write all derived structures as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Rank sites by risk score
    Risk {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List pending maintenance that was never resolved
    Pending {
        #[arg(long, default_value = "medium")]
        min_severity: Severity,
    },
    /// Contractor execution, pending and cancellation rates
    Contractors {
        #[arg(long)]
        problematic_only: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "audit-report.md")]
        out: PathBuf,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_ledger(path: Option<&Path>, config: &AuditConfig) -> anyhow::Result<(Ledger, String)> {
    match path {
        Some(path) => {
            let ledger = Ledger::from_csv_path(path, config)
                .with_context(|| format!("failed to read ledger {}", path.display()))?;
            Ok((ledger, path.display().to_string()))
        }
        None => {
            let pool = connect().await?;
            let ledger = db::fetch_ledger(&pool, config).await?;
            Ok((ledger, "postgres".to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AuditConfig::load(cli.config.as_deref()).context("invalid audit config")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?, &config).await?;
            println!("Seed ledger inserted.");
        }
        Commands::Import { csv } => {
            let content = std::fs::read(&csv)
                .with_context(|| format!("failed to read ledger {}", csv.display()))?;
            let ledger = Ledger::from_csv_reader(content.as_slice(), &config)
                .with_context(|| format!("failed to parse ledger {}", csv.display()))?;
            let stem = csv
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "import".to_string());
            let source = db::import_source(&stem, &content);
            let inserted = db::import_ledger(&connect().await?, &ledger, &source).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Audit { json } => {
            let (ledger, source) = load_ledger(cli.ledger.as_deref(), &config).await?;
            let results = audit::run_audit(&ledger, &config);
            let metrics = &results.metrics;

            println!("Audit of {source}:");
            println!("- {} sites, {} records", metrics.total_sites, metrics.total_records);
            println!("- execution rate {:.1}%", metrics.execution_rate);
            println!(
                "- {} sites with eliminated specialties",
                metrics.sites_with_eliminations
            );
            println!("- {} unresolved pending items", metrics.pending_alerts);
            println!(
                "- {} declining, {} growing, {} stable",
                metrics.declining_sites, metrics.growing_sites, metrics.stable_sites
            );

            if let Some(out) = json {
                let body = serde_json::to_string_pretty(&results)?;
                std::fs::write(&out, body)?;
                info!(path = %out.display(), "Audit results written");
                println!("Results written to {}.", out.display());
            }
        }
        Commands::Risk { limit } => {
            let (ledger, _) = load_ledger(cli.ledger.as_deref(), &config).await?;
            let results = audit::run_audit(&ledger, &config);

            if results.risk.is_empty() {
                println!("No sites found in the ledger.");
                return Ok(());
            }

            println!("Top sites by risk score:");
            for assessment in results.risk.iter().take(limit) {
                let elimination = results
                    .eliminations
                    .iter()
                    .find(|e| e.site_id == assessment.site_id);
                println!(
                    "- {} ({}) {} risk, score {} ({} maintenances lost, {:+} vs previous month)",
                    assessment.site_id,
                    assessment.site_name,
                    assessment.tier,
                    assessment.score,
                    elimination.map(|e| e.maintenances_lost).unwrap_or(0),
                    results
                        .trend(&assessment.site_id)
                        .map(|t| t.delta_vs_previous_month)
                        .unwrap_or(0)
                );
            }
        }
        Commands::Pending { min_severity } => {
            let (ledger, _) = load_ledger(cli.ledger.as_deref(), &config).await?;
            let alerts = pending::match_pending(&ledger, &config.thresholds);
            let shown: Vec<_> = alerts.iter().filter(|a| a.severity >= min_severity).collect();

            if shown.is_empty() {
                println!("No unresolved pending maintenance.");
                return Ok(());
            }

            for alert in shown {
                println!(
                    "- [{}] {} ({}) {}: pending {} ({}), next {} {} ({}), {} months",
                    alert.severity,
                    alert.site_id,
                    alert.site_name,
                    alert.specialty,
                    alert.pending_month,
                    alert.pending_month_ratio,
                    alert.next_month,
                    alert.next_status,
                    alert.next_month_ratio,
                    alert.months_between
                );
            }
        }
        Commands::Contractors { problematic_only } => {
            let (ledger, _) = load_ledger(cli.ledger.as_deref(), &config).await?;
            let summaries = contractor::summarize_contractors(&ledger, &config.thresholds);

            for summary in summaries.iter().filter(|s| s.problematic || !problematic_only) {
                println!(
                    "- {}{}: {} sites, {} executed ({:.1}%), {} pending ({:.1}%), {} cancelled ({:.1}%)",
                    summary.contractor,
                    if summary.problematic { " [problematic]" } else { "" },
                    summary.sites_served,
                    summary.executed,
                    summary.executed_pct,
                    summary.pending,
                    summary.pending_pct,
                    summary.cancelled,
                    summary.cancelled_pct
                );
            }
        }
        Commands::Report { out } => {
            let (ledger, source) = load_ledger(cli.ledger.as_deref(), &config).await?;
            let results = audit::run_audit(&ledger, &config);
            let report = report::build_report(&source, chrono::Utc::now().date_naive(), &results);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
