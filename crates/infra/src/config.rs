//! Application settings.
//!
//! Defaults are layered under any number of JSON files; a later file overrides
//! the properties it defines and leaves the rest untouched.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error loading configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which backend stores customers and mailing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    Postgres,
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub shutdown_timeout_seconds: u64,
    pub storage: Storage,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            shutdown_timeout_seconds: 30,
            storage: Storage::Postgres,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpServerSettings {
    pub port: u16,
    pub shutdown_timeout_seconds: u64,
}

impl Default for HttpServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub default_timeout_seconds: u64,
    pub max_connections: u32,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "mailman".to_string(),
            password: String::new(),
            database: "mailman".to_string(),
            default_timeout_seconds: 30,
            max_connections: 10,
        }
    }
}

impl std::fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("default_timeout_seconds", &self.default_timeout_seconds)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaleMailingEntryRemoverSettings {
    pub staleness_threshold_seconds: u64,
}

impl Default for StaleMailingEntryRemoverSettings {
    fn default() -> Self {
        Self {
            staleness_threshold_seconds: 2 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailingEntryCleanupJobSettings {
    pub period_seconds: u64,
}

impl Default for MailingEntryCleanupJobSettings {
    fn default() -> Self {
        Self {
            period_seconds: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub global: GlobalSettings,
    pub http_server: HttpServerSettings,
    pub postgres: PostgresSettings,
    pub stale_mailing_entry_remover: StaleMailingEntryRemoverSettings,
    pub mailing_entry_cleanup_job: MailingEntryCleanupJobSettings,
}

impl Settings {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.global.shutdown_timeout_seconds)
    }

    pub fn http_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.http_server.shutdown_timeout_seconds)
    }

    pub fn postgres_timeout(&self) -> Duration {
        Duration::from_secs(self.postgres.default_timeout_seconds)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_mailing_entry_remover.staleness_threshold_seconds)
    }

    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.mailing_entry_cleanup_job.period_seconds)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.mailing_entry_cleanup_job.period_seconds == 0 {
            return Err(ConfigError::Invalid(
                "mailing_entry_cleanup_job.period_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Load settings: defaults first, then every file in order.
///
/// Each file must exist and parse.
pub fn load<P>(paths: &[P]) -> Result<Settings, ConfigError>
where
    P: Into<PathBuf> + Clone,
{
    let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
    for path in paths {
        let path: PathBuf = path.clone().into();
        builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
    }

    let settings: Settings = builder.build()?.try_deserialize()?;
    settings.validate()
}
