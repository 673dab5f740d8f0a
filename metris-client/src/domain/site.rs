/// A site row scoped to one account, as returned by the account lookup.
///
/// `name` is the natural key used to join against external record sources;
/// `id` is the database's own identifier and is only used to address
/// mutations.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbSite {
    pub id: String,
    pub name: String,
}
