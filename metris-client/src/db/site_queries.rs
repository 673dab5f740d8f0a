use sqlx::PgPool;

use crate::domain::DbSite;

/// Fetch every site belonging to an account, matched by account name.
///
/// The account label in source spreadsheets rarely matches the stored name
/// exactly, so the match is a case-insensitive substring.
pub async fn sites_for_account(
    pool: &PgPool,
    account_name: &str,
) -> Result<Vec<DbSite>, sqlx::Error> {
    let pattern = format!("%{account_name}%");
    sqlx::query_as::<_, DbSite>(
        r#"
        SELECT s.id, s.name
        FROM sites s
        JOIN accounts a ON a.id = s.organization_id
        WHERE a.name ILIKE $1
        ORDER BY s.name
        "#,
    )
    .bind(&pattern)
    .fetch_all(pool)
    .await
}
