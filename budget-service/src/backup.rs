use std::io::Write;

use metris_client::{db::budget_queries, domain::SiteBudgetRow};
use sqlx::PgPool;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

/// Fatal by policy: the run must not proceed to mutation without a
/// successful backup.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("backup write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("backup write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("backup timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
}

/// Fetch the full prior budget rows for the given sites.
pub async fn snapshot(
    pool: &PgPool,
    site_ids: &[String],
) -> Result<Vec<SiteBudgetRow>, SnapshotError> {
    Ok(budget_queries::budgets_for_sites(pool, site_ids).await?)
}

/// Write the snapshot as CSV, header first, timestamps as RFC3339.
pub fn write_backup<W: Write>(writer: W, rows: &[SiteBudgetRow]) -> Result<(), SnapshotError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "site_id",
        "year",
        "month",
        "generation",
        "revenue",
        "created_at",
        "updated_at",
    ])?;

    for row in rows {
        let created_at = match row.created_at {
            Some(ts) => ts.format(&Rfc3339)?,
            None => String::new(),
        };
        let updated_at = match row.updated_at {
            Some(ts) => ts.format(&Rfc3339)?,
            None => String::new(),
        };
        wtr.write_record([
            row.site_id.clone(),
            row.year.to_string(),
            row.month.to_string(),
            row.generation.to_string(),
            row.revenue.map(|v| v.to_string()).unwrap_or_default(),
            created_at,
            updated_at,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
