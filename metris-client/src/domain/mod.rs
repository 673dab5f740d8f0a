mod budget;
mod site;

pub use budget::{BudgetLine, SiteBudgetRow};
pub use site::DbSite;
