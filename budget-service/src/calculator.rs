use metris_client::domain::BudgetLine;
use thiserror::Error;
use time::{macros::format_description, Date};

use crate::profile::MonthlyProfile;

#[derive(Error, Debug)]
pub enum DateParseError {
    #[error("commission date is missing")]
    Missing,
    #[error("invalid commission date '{raw}': {source}")]
    Invalid {
        raw: String,
        #[source]
        source: time::error::Parse,
    },
}

/// Parse a commission date, tolerating a trailing time-of-day portion
/// ("2021-05-14 00:00:00" parses as 2021-05-14).
///
/// A site without a parseable commission date has no commissioning year and
/// is excluded from calculation entirely rather than given a zero budget.
pub fn parse_commission_date(raw: Option<&str>) -> Result<Date, DateParseError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(DateParseError::Missing)?;
    let date_part = raw.split_whitespace().next().unwrap_or(raw);
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(date_part, &format).map_err(|source| DateParseError::Invalid {
        raw: raw.to_string(),
        source,
    })
}

/// Year-1 monthly budgets: the annual figure split by the profile.
///
/// No rounding happens here. Rounding is deferred to final row
/// materialization so degraded years scale the exact year-1 values instead
/// of compounding rounding error.
pub fn year_one_budgets(annual_generation: f64, profile: &MonthlyProfile) -> [f64; 12] {
    let mut out = [0.0; 12];
    for (month, fraction) in profile.months() {
        out[(month - 1) as usize] = annual_generation * fraction;
    }
    out
}

/// Full multi-year budget table for one site.
///
/// Offset 0 is the commissioning year and carries a degradation factor of
/// exactly 1.0. Offset k >= 1 scales the year-1 value by `(1 - rate)^k`;
/// the offset already equals years since commissioning, so there is no
/// off-by-one adjustment. Rows come out ordered year ascending, month
/// 1..=12.
pub fn all_year_budgets(
    year_one: &[f64; 12],
    commissioning_year: i32,
    num_years: u32,
    degradation_rate: f64,
) -> Vec<BudgetLine> {
    let mut lines = Vec::with_capacity(num_years as usize * 12);
    for offset in 0..num_years {
        let factor = if offset == 0 {
            1.0
        } else {
            (1.0 - degradation_rate).powi(offset as i32)
        };
        let year = commissioning_year + offset as i32;
        for (i, base) in year_one.iter().enumerate() {
            lines.push(BudgetLine {
                year,
                month: i as i32 + 1,
                generation: round2(base * factor),
            });
        }
    }
    lines
}

/// Round to two decimal places, half away from zero (`f64::round`
/// semantics): round2(0.125) == 0.13.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_one_budgets_sum_to_annual_generation() {
        let profile = MonthlyProfile::from_raw([
            0.0285, 0.0588, 0.0801, 0.1177, 0.1467, 0.1152, 0.1230, 0.1210, 0.0957, 0.0603,
            0.0278, 0.0251,
        ]);
        let annual = 4321.75;
        let year_one = year_one_budgets(annual, &profile);
        let total: f64 = year_one.iter().sum();
        assert!((total - annual).abs() < 1e-9);
    }

    #[test]
    fn commissioning_year_has_no_degradation() {
        let profile = MonthlyProfile::from_raw([0.10; 12]);
        let year_one = year_one_budgets(9000.0, &profile);
        let lines = all_year_budgets(&year_one, 2023, 2, 0.5);

        // Offset 0: factor exactly 1.0, month value = 9000 / 12.
        assert_eq!(lines[0].year, 2023);
        assert_eq!(lines[0].generation, 750.0);
        // Offset 1: halved.
        assert_eq!(lines[12].year, 2024);
        assert_eq!(lines[12].generation, 375.0);
    }

    #[test]
    fn uniform_profile_three_year_table() {
        let profile = MonthlyProfile::from_raw([0.10; 12]);
        let year_one = year_one_budgets(12_000.0, &profile);
        let lines = all_year_budgets(&year_one, 2020, 3, 0.10);

        assert_eq!(lines.len(), 36);
        for line in &lines[..12] {
            assert_eq!(line.year, 2020);
            assert_eq!(line.generation, 1000.0);
        }
        for line in &lines[12..24] {
            assert_eq!(line.year, 2021);
            assert_eq!(line.generation, 900.0);
        }
        for line in &lines[24..] {
            assert_eq!(line.year, 2022);
            assert_eq!(line.generation, 810.0);
        }
    }

    #[test]
    fn rows_are_ordered_year_then_month() {
        let profile = MonthlyProfile::from_raw([0.10; 12]);
        let year_one = year_one_budgets(1234.56, &profile);
        let lines = all_year_budgets(&year_one, 2019, 25, 0.004);

        assert_eq!(lines.len(), 25 * 12);
        let keys: Vec<(i32, i32)> = lines.iter().map(|l| (l.year, l.month)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(lines[0].month, 1);
        assert_eq!(lines[11].month, 12);
    }

    #[test]
    fn degraded_rows_equal_year_one_times_factor() {
        let profile = MonthlyProfile::from_raw([
            0.0285, 0.0588, 0.0801, 0.1177, 0.1467, 0.1152, 0.1230, 0.1210, 0.0957, 0.0603,
            0.0278, 0.0251,
        ]);
        let year_one = year_one_budgets(8_765.43, &profile);
        let rate = 0.004;
        let lines = all_year_budgets(&year_one, 2021, 25, rate);

        for (idx, line) in lines.iter().enumerate() {
            let offset = (idx / 12) as i32;
            let month = idx % 12;
            let expected = round2(year_one[month] * (1.0 - rate).powi(offset));
            assert_eq!(line.generation, expected);
        }
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        // Exactly-representable halves, so the rounding mode is what is
        // actually under test.
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(810.004), 810.0);
    }

    #[test]
    fn commission_date_ignores_time_portion() {
        let date = parse_commission_date(Some("2021-05-14 00:00:00")).unwrap();
        assert_eq!((date.year(), u8::from(date.month()), date.day()), (2021, 5, 14));
    }

    #[test]
    fn commission_date_missing_and_invalid_are_distinct() {
        assert!(matches!(parse_commission_date(None), Err(DateParseError::Missing)));
        assert!(matches!(parse_commission_date(Some("  ")), Err(DateParseError::Missing)));
        assert!(matches!(
            parse_commission_date(Some("14/05/2021")),
            Err(DateParseError::Invalid { .. })
        ));
    }
}
