use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::domain::{BudgetLine, SiteBudgetRow};

/// Fetch every existing budget row for the given sites, ordered so the
/// backup file is stable across runs.
pub async fn budgets_for_sites(
    pool: &PgPool,
    site_ids: &[String],
) -> Result<Vec<SiteBudgetRow>, sqlx::Error> {
    sqlx::query_as::<_, SiteBudgetRow>(
        r#"
        SELECT site_id, year, month, generation, revenue, created_at, updated_at
        FROM site_budgets
        WHERE site_id = ANY($1)
        ORDER BY site_id, year, month
        "#,
    )
    .bind(site_ids)
    .fetch_all(pool)
    .await
}

/// Delete every budget row for one site. Returns the number of rows removed.
pub async fn delete_site_budgets(
    tx: &mut Transaction<'_, Postgres>,
    site_id: &str,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query("DELETE FROM site_budgets WHERE site_id = $1")
        .bind(site_id)
        .execute(&mut **tx)
        .await?;
    Ok(res.rows_affected())
}

/// Insert a site's computed budget lines in one multi-row statement.
pub async fn insert_budget_lines(
    tx: &mut Transaction<'_, Postgres>,
    site_id: &str,
    lines: &[BudgetLine],
) -> Result<u64, sqlx::Error> {
    if lines.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO site_budgets (site_id, year, month, generation) ",
    );
    builder.push_values(lines, |mut b, line| {
        b.push_bind(site_id)
            .push_bind(line.year)
            .push_bind(line.month)
            .push_bind(line.generation);
    });

    let res = builder.build().execute(&mut **tx).await?;
    Ok(res.rows_affected())
}
