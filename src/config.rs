use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::engine::{SimulatedAnalysis, DEFAULT_WORKERS};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be set")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub ingest_workers: usize,
    pub analysis_delay: Duration,
    pub dead_letter_webhook_url: Option<String>,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage = match get("STORAGE") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "STORAGE",
                value: raw,
            })?,
            None => StorageBackend::Postgres,
        };

        let database_url = get("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing {
                key: "DATABASE_URL",
            });
        }

        let ingest_workers: usize = parse_or(&get, "INGEST_WORKERS", DEFAULT_WORKERS)?;
        if ingest_workers == 0 {
            return Err(ConfigError::Invalid {
                key: "INGEST_WORKERS",
                value: "0".to_string(),
            });
        }

        let default_delay = SimulatedAnalysis::DEFAULT_DELAY.as_millis() as u64;

        let config = Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 8080)?,
            storage,
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            ingest_workers,
            analysis_delay: Duration::from_millis(parse_or(&get, "ANALYSIS_DELAY_MS", default_delay)?),
            dead_letter_webhook_url: get("DEAD_LETTER_WEBHOOK_URL"),
            shutdown_timeout: Duration::from_secs(parse_or(&get, "SHUTDOWN_TIMEOUT_SECS", 30)?),
        };

        debug!("Storage backend: {:?}", config.storage);
        debug!("Ingest workers: {}", config.ingest_workers);

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
