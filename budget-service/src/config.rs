use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Account scope; sites are looked up by a case-insensitive substring
    /// match on this name.
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_num_years")]
    pub num_years: u32,
    #[serde(default = "default_degradation_rate")]
    pub degradation_rate: f64,
    /// Raw monthly percentages, January first. Normalized at startup; the
    /// default is the scheme's own profile (sums to 99.99% raw).
    #[serde(default = "default_monthly_profile")]
    pub monthly_profile: [f64; 12],
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_initial_batch_size")]
    pub initial_batch_size: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_unmatched_sample_size")]
    pub unmatched_sample_size: usize,
    #[serde(default = "default_calculation_sample_size")]
    pub calculation_sample_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_site_directory")]
    pub site_directory: String,
    /// Optional allow-list of site names; absence means no authoritative
    /// filtering.
    pub authoritative_list: Option<String>,
    #[serde(default = "default_backup_file")]
    pub backup: String,
    #[serde(default = "default_report_file")]
    pub report: String,
    #[serde(default = "default_sql_file")]
    pub sql: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub budgets: BudgetConfig,
    #[serde(default)]
    pub batching: BatchConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("BUDGET_FIX_CONFIG").unwrap_or_else(|_| "budget-fix.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            num_years: default_num_years(),
            degradation_rate: default_degradation_rate(),
            monthly_profile: default_monthly_profile(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: default_initial_batch_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            unmatched_sample_size: default_unmatched_sample_size(),
            calculation_sample_size: default_calculation_sample_size(),
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            site_directory: default_site_directory(),
            authoritative_list: None,
            backup: default_backup_file(),
            report: default_report_file(),
            sql: default_sql_file(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_num_years() -> u32 {
    25
}

fn default_degradation_rate() -> f64 {
    0.004
}

fn default_monthly_profile() -> [f64; 12] {
    [
        0.0285, 0.0588, 0.0801, 0.1177, 0.1467, 0.1152, 0.1230, 0.1210, 0.0957, 0.0603, 0.0278,
        0.0251,
    ]
}

fn default_initial_batch_size() -> usize {
    100
}

fn default_max_batch_size() -> usize {
    500
}

fn default_unmatched_sample_size() -> usize {
    50
}

fn default_calculation_sample_size() -> usize {
    5
}

fn default_site_directory() -> String {
    "property_meter_directory.csv".to_string()
}

fn default_backup_file() -> String {
    "site_budgets_backup.csv".to_string()
}

fn default_report_file() -> String {
    "budget_validation_report.json".to_string()
}

fn default_sql_file() -> String {
    "site_budgets_fix.sql".to_string()
}
