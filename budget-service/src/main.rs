use anyhow::{bail, Context, Result};
use budget_service::{
    backup,
    config::AppConfig,
    executor::{BatchExecutor, ExecutorConfig},
    observability,
    profile::MonthlyProfile,
    reconcile::{self, ReconcileOutcome},
    report::{self, ReportOptions},
    sources, spot_check, sql_script,
};
use metris_client::db::{budget_queries, site_queries};
use sqlx::postgres::PgPoolOptions;
use std::{env, fs::File};

/// Operation selected by the caller; replaces any interactive menu so the
/// core stays decoupled from the terminal.
enum Mode {
    Analyze,
    ListSites,
    Sql,
    Report,
    Execute { confirmed: bool },
    Verify,
}

fn parse_mode(args: &[String]) -> Result<Mode> {
    match args.get(1).map(String::as_str) {
        Some("analyze") => Ok(Mode::Analyze),
        Some("list-sites") => Ok(Mode::ListSites),
        Some("sql") => Ok(Mode::Sql),
        Some("report") => Ok(Mode::Report),
        Some("execute") => Ok(Mode::Execute {
            confirmed: args.iter().any(|a| a == "--confirm"),
        }),
        Some("verify") => Ok(Mode::Verify),
        _ => bail!(
            "usage: budget-service <analyze|list-sites|sql|report|execute [--confirm]|verify>"
        ),
    }
}

fn log_matching_summary(outcome: &ReconcileOutcome, num_years: u32) {
    tracing::info!(
        matched = outcome.matched.len(),
        in_source_not_db = outcome.in_source_not_db.len(),
        in_db_not_source = outcome.in_db_not_source.len(),
        in_source_not_authoritative = outcome.in_source_not_authoritative.len(),
        "site matching summary"
    );
    for name in outcome.in_source_not_db.iter().take(10) {
        tracing::warn!(site = %name, "in source but not in db");
    }
    for name in outcome.in_source_not_authoritative.iter().take(10) {
        tracing::warn!(site = %name, "in source but not on the authoritative list");
    }

    let planned_rows = outcome.matched.len() * num_years as usize * 12;
    tracing::info!(
        sites = outcome.matched.len(),
        budget_rows = planned_rows,
        "planned rewrite size"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    let mode = parse_mode(&args)?;

    let cfg = AppConfig::load()?;

    // The profile is validated before anything else runs; a structurally
    // broken distribution aborts the whole run.
    let profile = MonthlyProfile::from_raw(cfg.budgets.monthly_profile);
    profile.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;

    if let Mode::ListSites = mode {
        let sites = site_queries::sites_for_account(&pool, &cfg.account.name).await?;
        tracing::info!(account = %cfg.account.name, count = sites.len(), "sites for account");
        for site in sites.iter().take(50) {
            tracing::info!(site = %site.name, id = %site.id);
        }
        if sites.len() > 50 {
            tracing::info!(more = sites.len() - 50, "additional sites not listed");
        }
        return Ok(());
    }

    // Every remaining mode needs the directory, the optional allow-list and
    // the db site set.
    let directory_file = File::open(&cfg.files.site_directory)
        .with_context(|| format!("failed to open site directory {}", cfg.files.site_directory))?;
    let directory = sources::read_site_directory(directory_file)?;
    tracing::info!(
        rows = directory.intake.rows_processed,
        sites = directory.sites.len(),
        skipped_missing_key = directory.intake.skipped_missing_key,
        skipped_not_onboarded = directory.intake.skipped_not_onboarded,
        skipped_zero_generation = directory.intake.skipped_zero_generation,
        duplicates_superseded = directory.intake.duplicates_superseded,
        "site directory loaded"
    );

    let authoritative = match &cfg.files.authoritative_list {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open authoritative list {path}"))?;
            let names = sources::read_authoritative_list(file)?;
            tracing::info!(count = names.len(), "authoritative site list loaded");
            Some(names)
        }
        None => None,
    };

    let db_sites = site_queries::sites_for_account(&pool, &cfg.account.name).await?;
    tracing::info!(account = %cfg.account.name, count = db_sites.len(), "db sites loaded");

    let outcome = reconcile::match_sites(&directory.sites, &db_sites, authoritative.as_deref());
    log_matching_summary(&outcome, cfg.budgets.num_years);

    let report_opts = ReportOptions {
        account: cfg.account.name.clone(),
        degradation_rate: cfg.budgets.degradation_rate,
        num_years: cfg.budgets.num_years,
        unmatched_sample_size: cfg.report.unmatched_sample_size,
        calculation_sample_size: cfg.report.calculation_sample_size,
    };

    match mode {
        Mode::Analyze | Mode::ListSites => Ok(()),
        Mode::Sql => {
            let (script, stats) = sql_script::generate_sql_script(
                &outcome.matched,
                &profile,
                &cfg.account.name,
                cfg.budgets.num_years,
                cfg.budgets.degradation_rate,
            );
            std::fs::write(&cfg.files.sql, script)
                .with_context(|| format!("failed to write {}", cfg.files.sql))?;
            tracing::info!(
                file = %cfg.files.sql,
                sites = stats.sites_processed,
                skipped = stats.sites_skipped,
                insert_rows = stats.insert_rows,
                "sql script written"
            );
            Ok(())
        }
        Mode::Report => {
            let rpt = report::build_report(&outcome, directory.intake, &profile, &report_opts, None);
            let file = File::create(&cfg.files.report)
                .with_context(|| format!("failed to create {}", cfg.files.report))?;
            report::write_report(file, &rpt)?;
            tracing::info!(file = %cfg.files.report, "validation report written");
            Ok(())
        }
        Mode::Execute { confirmed } => {
            if outcome.matched.is_empty() {
                tracing::warn!("no sites matched; nothing to do");
                return Ok(());
            }

            // Backup first; a snapshot failure aborts before any mutation.
            let site_ids: Vec<String> =
                outcome.matched.iter().map(|s| s.site_id.clone()).collect();
            let rows = backup::snapshot(&pool, &site_ids).await?;
            let backup_file = File::create(&cfg.files.backup)
                .with_context(|| format!("failed to create {}", cfg.files.backup))?;
            backup::write_backup(backup_file, &rows)?;
            tracing::info!(file = %cfg.files.backup, rows = rows.len(), "backup written");

            let planned_inserts = outcome.matched.len() * cfg.budgets.num_years as usize * 12;
            if !confirmed {
                tracing::warn!(
                    sites = outcome.matched.len(),
                    planned_inserts,
                    "pre-flight only: pass --confirm to delete and rewrite these budgets"
                );
                return Ok(());
            }

            let executor = BatchExecutor::new(
                pool.clone(),
                ExecutorConfig {
                    num_years: cfg.budgets.num_years,
                    degradation_rate: cfg.budgets.degradation_rate,
                    initial_batch_size: cfg.batching.initial_batch_size,
                    max_batch_size: cfg.batching.max_batch_size,
                },
            );
            let stats = executor.run(&outcome.matched, &profile).await;

            tracing::info!(
                processed = stats.sites_processed,
                skipped = stats.sites_skipped,
                failed = stats.sites_failed,
                rows_deleted = stats.rows_deleted,
                rows_inserted = stats.rows_inserted,
                batches_committed = stats.batches_committed,
                batches_rolled_back = stats.batches_rolled_back,
                "execution complete"
            );
            for failure in stats.failed_sites.iter().take(10) {
                tracing::warn!(site = %failure.site_name, reason = %failure.reason, "site failed");
            }

            let rpt = report::build_report(
                &outcome,
                directory.intake,
                &profile,
                &report_opts,
                Some(stats),
            );
            let file = File::create(&cfg.files.report)
                .with_context(|| format!("failed to create {}", cfg.files.report))?;
            report::write_report(file, &rpt)?;
            tracing::info!(file = %cfg.files.report, "validation report written");
            Ok(())
        }
        Mode::Verify => {
            // Read the budgets back from the database and check them
            // against the source figures, the degradation rate and the
            // profile shape, independently of the calculator that wrote
            // them.
            let sample = cfg.report.calculation_sample_size;
            let mut checked = 0usize;
            let mut failures = 0usize;
            for site in outcome.matched.iter().take(sample) {
                let rows =
                    budget_queries::budgets_for_sites(&pool, &[site.site_id.clone()]).await?;
                checked += 1;
                match spot_check::check_site(
                    &site.site_name,
                    &rows,
                    Some(site.annual_generation),
                    &profile,
                    cfg.budgets.degradation_rate,
                ) {
                    None => {
                        failures += 1;
                        tracing::warn!(site = %site.site_name, "no budget rows in db");
                    }
                    Some(check) if check.passed() => {
                        tracing::info!(
                            site = %site.site_name,
                            rows = check.rows,
                            first_year = check.first_year,
                            year1_total = check.year1_total,
                            "spot check passed"
                        );
                    }
                    Some(check) => {
                        failures += 1;
                        tracing::warn!(
                            site = %site.site_name,
                            year1_total = check.year1_total,
                            expected_annual = ?check.expected_annual,
                            months_off_profile = ?check.months_off_profile,
                            "spot check failed"
                        );
                        for factor in check.degradation.iter().filter(|f| !f.ok) {
                            tracing::warn!(
                                site = %site.site_name,
                                year = factor.year,
                                actual = factor.actual,
                                expected = factor.expected,
                                "degradation factor off"
                            );
                        }
                    }
                }
            }

            if failures > 0 {
                bail!("{failures} of {checked} spot checks failed");
            }
            tracing::info!(checked, "all spot checks passed");
            Ok(())
        }
    }
}
