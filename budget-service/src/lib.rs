pub mod backup;
pub mod calculator;
pub mod config;
pub mod executor;
pub mod observability;
pub mod profile;
pub mod reconcile;
pub mod report;
pub mod sources;
pub mod spot_check;
pub mod sql_script;

pub use profile::MonthlyProfile;
pub use reconcile::{MatchedSite, ReconcileOutcome};
