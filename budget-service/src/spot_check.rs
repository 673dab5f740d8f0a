use std::collections::BTreeMap;

use metris_client::domain::SiteBudgetRow;

use crate::profile::MonthlyProfile;

// Checks run against persisted rows, so they allow for per-line rounding:
// totals within a cent of the source figure, degradation factors within
// 1e-4, monthly shares within half a percentage point.
const ANNUAL_TOLERANCE: f64 = 0.01;
const FACTOR_TOLERANCE: f64 = 1e-4;
const SHARE_TOLERANCE_PCT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct FactorCheck {
    pub year: i32,
    pub actual: f64,
    pub expected: f64,
    pub ok: bool,
}

/// Result of checking one site's budget rows as read back from the
/// database, independent of the calculator that wrote them.
#[derive(Debug, Clone)]
pub struct SiteCheck {
    pub site_name: String,
    pub rows: usize,
    pub first_year: i32,
    pub year1_total: f64,
    pub expected_annual: Option<f64>,
    pub annual_ok: Option<bool>,
    /// Year-over-year degradation of the second and third years, where
    /// present.
    pub degradation: Vec<FactorCheck>,
    /// Months of the first year whose share of the annual total deviates
    /// from the profile.
    pub months_off_profile: Vec<i32>,
}

impl SiteCheck {
    pub fn passed(&self) -> bool {
        self.annual_ok.unwrap_or(true)
            && self.degradation.iter().all(|f| f.ok)
            && self.months_off_profile.is_empty()
    }
}

/// Checks one site's persisted rows: the first year must total the source
/// annual figure, later years must decay by the degradation rate, and the
/// first year's monthly shape must follow the profile. Returns `None` when
/// the site has no rows at all.
pub fn check_site(
    site_name: &str,
    rows: &[SiteBudgetRow],
    expected_annual: Option<f64>,
    profile: &MonthlyProfile,
    degradation_rate: f64,
) -> Option<SiteCheck> {
    if rows.is_empty() {
        return None;
    }

    let mut by_year: BTreeMap<i32, Vec<&SiteBudgetRow>> = BTreeMap::new();
    for row in rows {
        by_year.entry(row.year).or_default().push(row);
    }

    let years: Vec<i32> = by_year.keys().copied().collect();
    let first_year = years[0];
    let year1_rows = &by_year[&first_year];
    let year1_total: f64 = year1_rows.iter().map(|r| r.generation).sum();

    let annual_ok = expected_annual.map(|annual| (year1_total - annual).abs() < ANNUAL_TOLERANCE);

    let mut degradation = Vec::new();
    let mut months_off_profile = Vec::new();
    if year1_total > 0.0 {
        for (offset, year) in years.iter().copied().enumerate().skip(1).take(2) {
            let total: f64 = by_year[&year].iter().map(|r| r.generation).sum();
            let actual = total / year1_total;
            let expected = (1.0 - degradation_rate).powi(offset as i32);
            degradation.push(FactorCheck {
                year,
                actual,
                expected,
                ok: (actual - expected).abs() < FACTOR_TOLERANCE,
            });
        }

        for month in 1..=12 {
            let generation: f64 = year1_rows
                .iter()
                .filter(|r| r.month == month)
                .map(|r| r.generation)
                .sum();
            let share_pct = generation / year1_total * 100.0;
            let expected_pct = profile.fraction(month as u32) * 100.0;
            if (share_pct - expected_pct).abs() > SHARE_TOLERANCE_PCT {
                months_off_profile.push(month);
            }
        }
    }

    Some(SiteCheck {
        site_name: site_name.to_string(),
        rows: rows.len(),
        first_year,
        year1_total,
        expected_annual,
        annual_ok,
        degradation,
        months_off_profile,
    })
}
