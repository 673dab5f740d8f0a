use time::OffsetDateTime;

/// One computed monthly budget line, before it is attached to a site and
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetLine {
    pub year: i32,
    pub month: i32,
    pub generation: f64,
}

/// A `site_budgets` row as it exists in the database, including the columns
/// the fix never rewrites. Used verbatim for the pre-mutation backup.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SiteBudgetRow {
    pub site_id: String,
    pub year: i32,
    pub month: i32,
    pub generation: f64,
    pub revenue: Option<f64>,
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
}
