mod authoritative_list;
mod site_directory;

pub use authoritative_list::read_authoritative_list;
pub use site_directory::{read_site_directory, IntakeStats, SiteDirectory, SiteRecord};

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read CSV record: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing column '{0}' in source file")]
    MissingColumn(&'static str),
}
