use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    calculator,
    executor::ExecutionStats,
    profile::MonthlyProfile,
    reconcile::ReconcileOutcome,
    sources::IntakeStats,
};

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_sites_in_source: usize,
    pub total_sites_in_db: usize,
    pub sites_matched: usize,
    pub sites_in_source_not_db: usize,
    pub sites_in_db_not_source: usize,
    pub sites_in_source_not_authoritative: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfiguration {
    pub account: String,
    pub degradation_rate: f64,
    pub years_generated: u32,
    pub monthly_profile: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedSites {
    pub in_source_not_db: Vec<String>,
    pub in_db_not_source: Vec<String>,
    pub in_source_not_authoritative: Vec<String>,
}

/// A fully-worked calculation for one matched site, for human
/// spot-verification. Produced by the same calculator the executor uses.
#[derive(Debug, Clone, Serialize)]
pub struct SampleCalculation {
    pub site_name: String,
    pub annual_generation: f64,
    pub commission_date: String,
    pub year1_total: f64,
    pub matches_annual: bool,
    pub year1_monthly: BTreeMap<String, f64>,
    pub year2_monthly_sample: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub generated_at: String,
    pub summary: ReportSummary,
    pub intake: IntakeStats,
    pub configuration: ReportConfiguration,
    pub unmatched_sites: UnmatchedSites,
    pub sample_calculations: Vec<SampleCalculation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_stats: Option<ExecutionStats>,
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub account: String,
    pub degradation_rate: f64,
    pub num_years: u32,
    /// Unmatched key lists are truncated to this many entries to keep the
    /// report finite.
    pub unmatched_sample_size: usize,
    pub calculation_sample_size: usize,
}

pub fn build_report(
    outcome: &ReconcileOutcome,
    intake: IntakeStats,
    profile: &MonthlyProfile,
    opts: &ReportOptions,
    execution_stats: Option<ExecutionStats>,
) -> ValidationReport {
    let truncate = |keys: &[String]| -> Vec<String> {
        keys.iter().take(opts.unmatched_sample_size).cloned().collect()
    };

    let mut sample_calculations = Vec::new();
    for site in &outcome.matched {
        if sample_calculations.len() >= opts.calculation_sample_size {
            break;
        }
        if calculator::parse_commission_date(site.commission_date.as_deref()).is_err() {
            continue;
        }

        let year_one = calculator::year_one_budgets(site.annual_generation, profile);
        let year1_total: f64 = year_one.iter().sum();
        let year2_factor = 1.0 - opts.degradation_rate;

        sample_calculations.push(SampleCalculation {
            site_name: site.site_name.clone(),
            annual_generation: site.annual_generation,
            commission_date: site.commission_date.clone().unwrap_or_default(),
            year1_total: calculator::round2(year1_total),
            matches_annual: (year1_total - site.annual_generation).abs() < 0.01,
            year1_monthly: year_one
                .iter()
                .enumerate()
                .map(|(i, v)| ((i + 1).to_string(), calculator::round2(*v)))
                .collect(),
            year2_monthly_sample: year_one
                .iter()
                .take(3)
                .enumerate()
                .map(|(i, v)| ((i + 1).to_string(), calculator::round2(v * year2_factor)))
                .collect(),
        });
    }

    ValidationReport {
        generated_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        summary: ReportSummary {
            total_sites_in_source: outcome.matched.len()
                + outcome.in_source_not_db.len()
                + outcome.in_source_not_authoritative.len(),
            total_sites_in_db: outcome.matched.len() + outcome.in_db_not_source.len(),
            sites_matched: outcome.matched.len(),
            sites_in_source_not_db: outcome.in_source_not_db.len(),
            sites_in_db_not_source: outcome.in_db_not_source.len(),
            sites_in_source_not_authoritative: outcome.in_source_not_authoritative.len(),
        },
        intake,
        configuration: ReportConfiguration {
            account: opts.account.clone(),
            degradation_rate: opts.degradation_rate,
            years_generated: opts.num_years,
            monthly_profile: profile
                .months()
                .map(|(month, fraction)| (month.to_string(), fraction))
                .collect(),
        },
        unmatched_sites: UnmatchedSites {
            in_source_not_db: truncate(&outcome.in_source_not_db),
            in_db_not_source: truncate(&outcome.in_db_not_source),
            in_source_not_authoritative: truncate(&outcome.in_source_not_authoritative),
        },
        sample_calculations,
        execution_stats,
    }
}

pub fn write_report<W: Write>(writer: W, report: &ValidationReport) -> Result<(), serde_json::Error> {
    serde_json::to_writer_pretty(writer, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::MatchedSite;

    fn opts() -> ReportOptions {
        ReportOptions {
            account: "Test Scheme".to_string(),
            degradation_rate: 0.10,
            num_years: 3,
            unmatched_sample_size: 2,
            calculation_sample_size: 5,
        }
    }

    fn outcome() -> ReconcileOutcome {
        ReconcileOutcome {
            matched: vec![
                MatchedSite {
                    site_id: "id-1".to_string(),
                    site_name: "STO-1".to_string(),
                    commission_date: Some("2020-01-01".to_string()),
                    annual_generation: 12_000.0,
                },
                MatchedSite {
                    site_id: "id-2".to_string(),
                    site_name: "STO-2".to_string(),
                    commission_date: None,
                    annual_generation: 5000.0,
                },
            ],
            in_source_not_db: vec!["X1".into(), "X2".into(), "X3".into()],
            in_db_not_source: vec!["D1".into()],
            in_source_not_authoritative: vec![],
        }
    }

    #[test]
    fn sample_calculations_reproduce_the_calculator() {
        let profile = MonthlyProfile::from_raw([0.10; 12]);
        let report = build_report(&outcome(), IntakeStats::default(), &profile, &opts(), None);

        // STO-2 has no commission date, so only STO-1 is sampled.
        assert_eq!(report.sample_calculations.len(), 1);
        let sample = &report.sample_calculations[0];
        assert_eq!(sample.site_name, "STO-1");
        assert_eq!(sample.year1_total, 12_000.0);
        assert!(sample.matches_annual);
        assert_eq!(sample.year1_monthly.get("1"), Some(&1000.0));
        assert_eq!(sample.year2_monthly_sample.len(), 3);
        assert_eq!(sample.year2_monthly_sample.get("2"), Some(&900.0));
    }

    #[test]
    fn unmatched_lists_are_truncated_but_counts_are_not() {
        let profile = MonthlyProfile::from_raw([0.10; 12]);
        let report = build_report(&outcome(), IntakeStats::default(), &profile, &opts(), None);

        assert_eq!(report.summary.sites_in_source_not_db, 3);
        assert_eq!(report.unmatched_sites.in_source_not_db.len(), 2);
        assert_eq!(report.summary.total_sites_in_source, 5);
        assert_eq!(report.summary.total_sites_in_db, 3);
    }

    #[test]
    fn execution_stats_are_omitted_from_json_when_absent() {
        let profile = MonthlyProfile::from_raw([0.10; 12]);
        let report = build_report(&outcome(), IntakeStats::default(), &profile, &opts(), None);

        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("execution_stats"));
        assert!(text.contains("\"sites_matched\": 2"));
    }
}
