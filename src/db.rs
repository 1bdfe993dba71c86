use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuditConfig;
use crate::ledger::Ledger;
use crate::models::{MaintenanceRecord, Status};
use crate::month::ScheduledMonth;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn insert_record(
    pool: &PgPool,
    record: &MaintenanceRecord,
    ledger_row: i64,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO pm_audit.maintenance_records
        (id, site_id, site_name, specialty, priority, contractor, status,
         scheduled_month, ledger_row, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&record.site_id)
    .bind(&record.site_name)
    .bind(&record.specialty)
    .bind(&record.priority)
    .bind(&record.contractor)
    .bind(record.status.as_str())
    .bind(record.scheduled_month.to_string())
    .bind(ledger_row)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool, config: &AuditConfig) -> anyhow::Result<()> {
    let sites = [
        ("LIM001", "Lima Centro", "P_1", "FLM Norte"),
        ("ARE014", "Arequipa Cayma", "D_2", "FLM Sur"),
        ("CUS007", "Cusco San Blas", "B_3", "FLM Sur"),
    ];
    let months = ["ene-24", "feb-24", "mar-24", "abr-24", "may-24", "jun-24"];
    // (site index, specialty, status per month)
    let plan: [(usize, &str, [&str; 6]); 6] = [
        (0, "AA", ["Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado"]),
        (0, "GE-TTA-TK", ["Ejecutado", "Ejecutado", "Cancelado", "Cancelado", "Cancelado", "Pendiente"]),
        (1, "UPS", ["Ejecutado", "Pendiente", "Pendiente", "Pendiente", "Pendiente", "Ejecutado"]),
        (1, "TX", ["Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado", "Cancelado"]),
        (2, "RADIO", ["Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado"]),
        (2, "SOL-EOL", ["Pendiente", "Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado", "Ejecutado"]),
    ];

    let mut ledger_row = 0i64;
    for (site, specialty, statuses) in plan {
        let (site_id, site_name, priority, contractor) = sites[site];
        for (month, status) in months.iter().zip(statuses) {
            let record = MaintenanceRecord {
                site_id: site_id.to_string(),
                site_name: site_name.to_string(),
                specialty: specialty.to_string(),
                priority: priority.to_string(),
                contractor: contractor.to_string(),
                status: Status::normalize(status),
                scheduled_month: ScheduledMonth::parse(month, &config.month_names),
            };
            insert_record(pool, &record, ledger_row, &format!("seed-{ledger_row:03}")).await?;
            ledger_row += 1;
        }
    }

    debug!(rows = ledger_row, "Seed ledger written");
    Ok(())
}

pub fn import_source(stem: &str, content: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(content));
    format!("{stem}-{}", &digest[..16])
}

pub fn source_key(source: &str, row: usize) -> String {
    format!("{source}-{row}")
}

pub async fn import_ledger(pool: &PgPool, ledger: &Ledger, source: &str) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for (row, record) in ledger.records().iter().enumerate() {
        let ledger_row = row as i64;
        if insert_record(pool, record, ledger_row, &source_key(source, row)).await? {
            inserted += 1;
        }
    }

    info!(source, inserted, total = ledger.len(), "Ledger imported");
    Ok(inserted)
}

pub async fn fetch_ledger(pool: &PgPool, config: &AuditConfig) -> anyhow::Result<Ledger> {
    let rows = sqlx::query(
        "SELECT site_id, site_name, specialty, priority, contractor, status, scheduled_month \
         FROM pm_audit.maintenance_records \
         ORDER BY imported_at, ledger_row",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.get("status");
        let scheduled_month: String = row.get("scheduled_month");
        records.push(MaintenanceRecord {
            site_id: row.get("site_id"),
            site_name: row.get("site_name"),
            specialty: row.get("specialty"),
            priority: row.get("priority"),
            contractor: row.get("contractor"),
            status: Status::normalize(&status),
            scheduled_month: ScheduledMonth::parse(&scheduled_month, &config.month_names),
        });
    }

    Ok(Ledger::new(records))
}
