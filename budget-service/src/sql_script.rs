use std::fmt::Write as _;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{calculator, profile::MonthlyProfile, reconcile::MatchedSite};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SqlScriptStats {
    pub sites_processed: usize,
    pub sites_skipped: usize,
    pub delete_statements: usize,
    pub insert_rows: usize,
}

/// Emit a reviewable SQL script covering every matched site: one
/// transaction, per-site `DELETE` plus a multi-row `INSERT`.
///
/// Sites without a parseable commission date are skipped, consistent with
/// the executor.
pub fn generate_sql_script(
    matched: &[MatchedSite],
    profile: &MonthlyProfile,
    account: &str,
    num_years: u32,
    degradation_rate: f64,
) -> (String, SqlScriptStats) {
    let mut sql = String::new();
    let mut stats = SqlScriptStats::default();

    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    let _ = writeln!(sql, "-- Site budgets fix");
    let _ = writeln!(sql, "-- Generated: {generated_at}");
    let _ = writeln!(sql, "-- Account: {account}");
    let _ = writeln!(sql, "-- Number of sites: {}", matched.len());
    let _ = writeln!(sql, "-- Years to generate: {num_years}");
    let _ = writeln!(sql, "-- Degradation rate: {}%", degradation_rate * 100.0);
    sql.push('\n');
    sql.push_str("BEGIN;\n\n");

    for site in matched {
        let date = match calculator::parse_commission_date(site.commission_date.as_deref()) {
            Ok(date) => date,
            Err(_) => {
                stats.sites_skipped += 1;
                continue;
            }
        };

        let year_one = calculator::year_one_budgets(site.annual_generation, profile);
        let lines = calculator::all_year_budgets(&year_one, date.year(), num_years, degradation_rate);

        let _ = writeln!(sql, "-- Site: {}", site.site_name);
        let _ = writeln!(sql, "-- Site ID: {}", site.site_id);
        let _ = writeln!(
            sql,
            "-- Commissioning: {}",
            site.commission_date.as_deref().unwrap_or("")
        );
        let _ = writeln!(
            sql,
            "-- Annual Generation: {:.2} kWh",
            site.annual_generation
        );
        sql.push('\n');

        let _ = writeln!(
            sql,
            "DELETE FROM site_budgets WHERE site_id = '{}';",
            site.site_id
        );
        stats.delete_statements += 1;
        sql.push('\n');

        sql.push_str("INSERT INTO site_budgets (site_id, year, month, generation)\nVALUES\n");
        let values: Vec<String> = lines
            .iter()
            .map(|line| {
                format!(
                    "  ('{}', {}, {}, {:.2})",
                    site.site_id, line.year, line.month, line.generation
                )
            })
            .collect();
        sql.push_str(&values.join(",\n"));
        sql.push_str(";\n\n");

        stats.sites_processed += 1;
        stats.insert_rows += lines.len();
    }

    sql.push_str("COMMIT;\n");

    (sql, stats)
}
