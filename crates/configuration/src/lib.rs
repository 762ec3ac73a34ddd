use crate::error::ConfigError;
use core_types::{CompanyUnit, Currency};
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    ApiSettings, DashboardSettings, DatabaseSettings, LoggingSettings, SeedSettings, Settings,
};

/// The file settings are read from when no other path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Environment variables that override the file, and the setting each one sets.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("API_HOST", "api.host"),
    ("API_PORT", "api.port"),
    ("DEBUG", "api.debug"),
    ("DATABASE_URL", "database.url"),
    ("DATABASE_MAX_CONNECTIONS", "database.max_connections"),
    ("API_BASE_URL", "dashboard.api_base_url"),
    ("DEFAULT_COMPANY_UNIT", "dashboard.default_company_unit"),
    ("DEFAULT_CURRENCY", "dashboard.default_currency"),
    ("DASHBOARD_HOST", "dashboard.host"),
    ("DASHBOARD_PORT", "dashboard.port"),
    ("DASHBOARD_CACHE_TTL_SECS", "dashboard.cache_ttl_secs"),
    ("SEED_SAMPLE_DATA", "seed.enabled"),
    ("SEED_MONTHS", "seed.months"),
    ("LOG_DIR", "logging.directory"),
];

/// Command-line switches shared by every binary.
#[cfg(feature = "clap")]
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: std::path::PathBuf,

    /// Force debug logging regardless of the DEBUG variable.
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Loads the application configuration from `config.toml` and the process environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Loads settings from built-in defaults, then `path` if it exists, then the
/// variables in [`ENV_OVERRIDES`] as resolved by `lookup`.
pub fn load_settings_from<F>(path: &Path, lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = config::Config::builder()
        .set_default("api.host", "0.0.0.0")?
        .set_default("api.port", 8001_i64)?
        .set_default("api.debug", false)?
        .set_default("database.url", "sqlite://financial_analytics.db")?
        .set_default("database.max_connections", 5_i64)?
        .set_default("dashboard.host", "0.0.0.0")?
        .set_default("dashboard.port", 8501_i64)?
        .set_default("dashboard.api_base_url", "http://localhost:8001")?
        .set_default("dashboard.default_company_unit", CompanyUnit::default().as_str())?
        .set_default("dashboard.default_currency", Currency::default().code())?
        .set_default("dashboard.cache_ttl_secs", 300_i64)?
        .set_default("seed.enabled", true)?
        .set_default("seed.months", 24_i64)?
        .set_default("seed.rng_seed", 42_i64)?
        .add_source(config::File::from(path).required(false));

    for (var, key) in ENV_OVERRIDES {
        let value = lookup(var).filter(|v| !v.trim().is_empty());
        let value = match (*var, value) {
            ("DEFAULT_COMPANY_UNIT", Some(v)) => Some(
                v.parse::<CompanyUnit>()
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))?
                    .as_str()
                    .to_string(),
            ),
            ("DEFAULT_CURRENCY", Some(v)) => Some(
                v.parse::<Currency>()
                    .map_err(|e| ConfigError::ValidationError(e.to_string()))?
                    .code()
                    .to_string(),
            ),
            (_, value) => value,
        };
        builder = builder.set_override_option(*key, value)?;
    }

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.build()?.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
