pub mod budget_queries;
pub mod site_queries;
