use metris_client::db::budget_queries;
use metris_client::domain::BudgetLine;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::{calculator, profile::MonthlyProfile, reconcile::MatchedSite};

/// Adaptive batch sizing: doubles after two consecutive committed batches
/// (capped at the ceiling), halves after any rollback (floored), and a
/// rollback resets the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveBatch {
    size: usize,
    floor: usize,
    ceiling: usize,
    consecutive_commits: u32,
}

impl AdaptiveBatch {
    pub fn new(floor: usize, ceiling: usize) -> Self {
        let floor = floor.max(1);
        Self {
            size: floor,
            floor,
            ceiling: ceiling.max(floor),
            consecutive_commits: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn on_commit(&mut self) {
        self.consecutive_commits += 1;
        if self.consecutive_commits >= 2 {
            self.size = (self.size * 2).min(self.ceiling);
        }
    }

    pub fn on_rollback(&mut self) {
        self.consecutive_commits = 0;
        self.size = (self.size / 2).max(self.floor);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub num_years: u32,
    pub degradation_rate: f64,
    pub initial_batch_size: usize,
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteFailure {
    pub site_name: String,
    pub reason: String,
}

/// Aggregate counters for a whole run. Every skip and failure is
/// individually attributable; nothing is dropped silently.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub sites_processed: usize,
    pub sites_skipped: usize,
    pub sites_failed: usize,
    pub rows_deleted: u64,
    pub rows_inserted: u64,
    pub batches_committed: usize,
    pub batches_rolled_back: usize,
    pub skipped_sites: Vec<SiteFailure>,
    pub failed_sites: Vec<SiteFailure>,
}

#[derive(Debug, Default)]
struct BatchDelta {
    processed: usize,
    rows_deleted: u64,
    rows_inserted: u64,
    skipped: Vec<SiteFailure>,
}

/// The store the executor mutates through, one transactional unit of work
/// per batch. Dropping an uncommitted `Tx` must roll its changes back.
#[allow(async_fn_in_trait)]
pub trait BudgetStore {
    type Tx<'c>
    where
        Self: 'c;

    async fn begin(&self) -> Result<Self::Tx<'_>, sqlx::Error>;
    async fn delete_site_budgets(
        &self,
        tx: &mut Self::Tx<'_>,
        site_id: &str,
    ) -> Result<u64, sqlx::Error>;
    async fn insert_budget_lines(
        &self,
        tx: &mut Self::Tx<'_>,
        site_id: &str,
        lines: &[BudgetLine],
    ) -> Result<u64, sqlx::Error>;
    async fn commit(&self, tx: Self::Tx<'_>) -> Result<(), sqlx::Error>;
}

impl BudgetStore for PgPool {
    type Tx<'c> = Transaction<'c, Postgres>
    where
        Self: 'c;

    async fn begin(&self) -> Result<Self::Tx<'_>, sqlx::Error> {
        PgPool::begin(self).await
    }

    async fn delete_site_budgets(
        &self,
        tx: &mut Self::Tx<'_>,
        site_id: &str,
    ) -> Result<u64, sqlx::Error> {
        budget_queries::delete_site_budgets(tx, site_id).await
    }

    async fn insert_budget_lines(
        &self,
        tx: &mut Self::Tx<'_>,
        site_id: &str,
        lines: &[BudgetLine],
    ) -> Result<u64, sqlx::Error> {
        budget_queries::insert_budget_lines(tx, site_id, lines).await
    }

    async fn commit(&self, tx: Self::Tx<'_>) -> Result<(), sqlx::Error> {
        tx.commit().await
    }
}

/// Applies delete-then-insert budget rewrites in adaptive batches.
///
/// Each batch runs in one transaction; a failure anywhere in a batch rolls
/// the whole batch back, marks every site in it failed, and the run
/// continues with the next batch at a halved size. The delete-then-insert
/// pairing per site is what makes a rerun safe.
pub struct BatchExecutor<S = PgPool> {
    store: S,
    cfg: ExecutorConfig,
}

impl<S: BudgetStore> BatchExecutor<S> {
    pub fn new(store: S, cfg: ExecutorConfig) -> Self {
        Self { store, cfg }
    }

    pub async fn run(&self, matched: &[MatchedSite], profile: &MonthlyProfile) -> ExecutionStats {
        let mut stats = ExecutionStats::default();
        let mut sizing = AdaptiveBatch::new(self.cfg.initial_batch_size, self.cfg.max_batch_size);

        let mut start = 0;
        let mut batch_num = 0u32;
        while start < matched.len() {
            batch_num += 1;
            let end = (start + sizing.size()).min(matched.len());
            let batch = &matched[start..end];

            tracing::info!(
                batch = batch_num,
                sites = batch.len(),
                batch_size = sizing.size(),
                "applying batch"
            );

            match self.apply_batch(batch, profile).await {
                Ok(delta) => {
                    stats.sites_processed += delta.processed;
                    stats.rows_deleted += delta.rows_deleted;
                    stats.rows_inserted += delta.rows_inserted;
                    stats.sites_skipped += delta.skipped.len();
                    stats.skipped_sites.extend(delta.skipped);
                    stats.batches_committed += 1;
                    sizing.on_commit();
                    metrics::counter!("budget_batches_committed_total").increment(1);
                    tracing::info!(batch = batch_num, "batch committed");
                }
                Err(e) => {
                    // The transaction rolled back with the batch; pending
                    // skips and row counts from it are discarded too, and
                    // every site in the batch is marked failed.
                    stats.batches_rolled_back += 1;
                    for site in batch {
                        stats.sites_failed += 1;
                        stats.failed_sites.push(SiteFailure {
                            site_name: site.site_name.clone(),
                            reason: format!("batch failed: {e}"),
                        });
                    }
                    sizing.on_rollback();
                    metrics::counter!("budget_batches_rolled_back_total").increment(1);
                    tracing::error!(
                        batch = batch_num,
                        error = %e,
                        next_batch_size = sizing.size(),
                        "batch rolled back"
                    );
                }
            }

            start = end;
        }

        stats
    }

    /// One transactional unit of work. Dropping the transaction on the `?`
    /// path rolls every site in the batch back, including previously
    /// successful ones.
    async fn apply_batch(
        &self,
        batch: &[MatchedSite],
        profile: &MonthlyProfile,
    ) -> Result<BatchDelta, sqlx::Error> {
        let mut tx = self.store.begin().await?;
        let mut delta = BatchDelta::default();

        for site in batch {
            let date = match calculator::parse_commission_date(site.commission_date.as_deref()) {
                Ok(date) => date,
                Err(e) => {
                    // Skip, not a failure: the site has no commissioning
                    // year, so it is excluded from the rewrite entirely.
                    delta.skipped.push(SiteFailure {
                        site_name: site.site_name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let year_one = calculator::year_one_budgets(site.annual_generation, profile);
            let lines = calculator::all_year_budgets(
                &year_one,
                date.year(),
                self.cfg.num_years,
                self.cfg.degradation_rate,
            );

            delta.rows_deleted += self.store.delete_site_budgets(&mut tx, &site.site_id).await?;
            delta.rows_inserted += self
                .store
                .insert_budget_lines(&mut tx, &site.site_id, &lines)
                .await?;
            delta.processed += 1;
        }

        self.store.commit(tx).await?;

        // Counters only move on the commit path, so they stay consistent
        // with the stats when a batch rolls back.
        metrics::counter!("budget_rows_deleted_total").increment(delta.rows_deleted);
        metrics::counter!("budget_rows_inserted_total").increment(delta.rows_inserted);
        metrics::counter!("budget_sites_skipped_total").increment(delta.skipped.len() as u64);

        Ok(delta)
    }
}
