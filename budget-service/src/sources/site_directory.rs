use std::collections::HashSet;
use std::io::Read;

use super::SourceError;

/// One usable row from the site directory sheet.
///
/// `sto_number` is the natural key that joins the directory against the
/// database's site names. The commission date is kept raw; parsing happens
/// where the commissioning year is actually needed.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub sto_number: String,
    pub commission_date: Option<String>,
    pub annual_generation: f64,
}

/// Per-reason intake counters. Rows rejected here never reach the
/// reconciler, but every rejection stays countable for the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IntakeStats {
    pub rows_processed: usize,
    pub skipped_missing_key: usize,
    pub skipped_not_onboarded: usize,
    pub skipped_zero_generation: usize,
    pub duplicates_superseded: usize,
}

#[derive(Debug, Clone)]
pub struct SiteDirectory {
    pub sites: Vec<SiteRecord>,
    pub intake: IntakeStats,
}

/// Read the site directory CSV.
///
/// Expected header columns (by name):
/// - sto_number
/// - onboarded ("yes" marks rows that were actually onboarded)
/// - commission_date (optional, `YYYY-MM-DD` with or without a time part)
/// - annual_generation_kwh (required non-zero)
///
/// The first occurrence of a duplicate sto_number wins; later rows are
/// superseded silently but counted.
pub fn read_site_directory<R: Read>(reader: R) -> Result<SiteDirectory, SourceError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let col = |name: &'static str| -> Result<usize, SourceError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or(SourceError::MissingColumn(name))
    };

    let sto_col = col("sto_number")?;
    let onboarded_col = col("onboarded")?;
    let date_col = col("commission_date")?;
    let gen_col = col("annual_generation_kwh")?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut sites = Vec::new();
    let mut intake = IntakeStats::default();

    for result in rdr.records() {
        let record = result?;
        intake.rows_processed += 1;

        let sto = record.get(sto_col).map(str::trim).unwrap_or("");
        if sto.is_empty() {
            intake.skipped_missing_key += 1;
            continue;
        }

        let onboarded = record.get(onboarded_col).map(str::trim).unwrap_or("");
        if !onboarded.to_ascii_lowercase().contains("yes") {
            intake.skipped_not_onboarded += 1;
            continue;
        }

        let generation: f64 = record
            .get(gen_col)
            .map(str::trim)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);
        if generation == 0.0 {
            intake.skipped_zero_generation += 1;
            continue;
        }

        if !seen.insert(sto.to_string()) {
            intake.duplicates_superseded += 1;
            continue;
        }

        let commission_date = record
            .get(date_col)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        sites.push(SiteRecord {
            sto_number: sto.to_string(),
            commission_date,
            annual_generation: generation,
        });
    }

    Ok(SiteDirectory { sites, intake })
}
