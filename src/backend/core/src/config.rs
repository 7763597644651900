//! Configuration management.

use serde::Deserialize;

use crate::error::Result;

/// Main configuration for the authorization core.
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Audit recorder configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Load configuration from `config/atrium.*` (if present) layered with
    /// `ATRIUM__`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/atrium").required(false))
            .add_source(config::Environment::with_prefix("ATRIUM").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Upper bound on how long one audit append may block its caller.
    #[serde(default = "default_audit_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl AuditConfig {
    pub fn write_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: default_audit_write_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON logging (production); pretty format otherwise.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_audit_write_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}
