use core_types::{CompanyUnit, Currency};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub database: DatabaseSettings,
    pub dashboard: DashboardSettings,
    pub seed: SeedSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// The HTTP API service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
    /// Enables verbose logging and detailed error output.
    pub debug: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// A sqlx SQLite URL, e.g. `sqlite://financial_analytics.db` or `sqlite::memory:`.
    pub url: String,
    pub max_connections: u32,
}

/// The server-rendered dashboard.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSettings {
    pub host: String,
    pub port: u16,
    /// Where the dashboard reaches the API.
    pub api_base_url: String,
    pub default_company_unit: CompanyUnit,
    pub default_currency: Currency,
    /// How long fetched API data is reused before it is requested again.
    pub cache_ttl_secs: u64,
}

/// Sample data generated on first start when the store is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSettings {
    pub enabled: bool,
    pub months: u32,
    /// Seed for the random generator so every fresh store looks the same.
    pub rng_seed: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSettings {
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl ApiSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }
}

impl DashboardSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let ip: IpAddr = match host {
        "localhost" => IpAddr::from([127, 0, 0, 1]),
        other => other
            .parse()
            .map_err(|_| ConfigError::ValidationError(format!("invalid host address '{other}'")))?,
    };
    Ok(SocketAddr::new(ip, port))
}

impl Settings {
    /// Rejects settings the services cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.port == 0 {
            return Err(ConfigError::ValidationError("api.port must not be 0".to_string()));
        }
        if self.dashboard.port == 0 {
            return Err(ConfigError::ValidationError("dashboard.port must not be 0".to_string()));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("database.url must be set".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.dashboard.api_base_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "dashboard.api_base_url '{}' is not a valid URL: {e}",
                self.dashboard.api_base_url
            ))
        })?;
        if self.seed.months == 0 {
            return Err(ConfigError::ValidationError("seed.months must be at least 1".to_string()));
        }
        self.api.socket_addr()?;
        self.dashboard.socket_addr()?;
        Ok(())
    }
}
