use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct SalesConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub idempotency: IdempotencyConfig,
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencyConfig {
    pub ttl_hours: u64,
    pub sweep_interval_secs: u64,
}

impl IdempotencyConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 60 * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Report an empty page as NotFound instead of an empty listing.
    pub empty_page_is_not_found: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            empty_page_is_not_found: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

impl SalesConfig {
    pub fn load() -> Result<Self, AppError> {
        // Common config handles .env and the APP__ prefix.
        let common_config = core_config::Config::load()?;
        let is_prod = common_config.is_production();

        let storage: StorageBackend = get_env("SALES_STORAGE", Some("postgres"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        // The connection string is only mandatory when Postgres is in use.
        let database_url = match storage {
            StorageBackend::Postgres => get_env("DATABASE_URL", None, is_prod)?,
            StorageBackend::Memory => env::var("DATABASE_URL").unwrap_or_default(),
        };

        Ok(SalesConfig {
            common: common_config,
            service_name: get_env("SERVICE_NAME", Some("sales-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.trim().is_empty()),
            storage,
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: get_parsed("DATABASE_MIN_CONNECTIONS", 1)?,
                acquire_timeout_secs: get_parsed("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?,
                run_migrations: get_parsed("DATABASE_RUN_MIGRATIONS", true)?,
            },
            idempotency: IdempotencyConfig {
                ttl_hours: get_parsed("IDEMPOTENCY_TTL_HOURS", 24)?,
                sweep_interval_secs: get_parsed("IDEMPOTENCY_SWEEP_INTERVAL_SECS", 300)?,
            },
            listing: ListingConfig {
                default_page_size: get_parsed("LISTING_DEFAULT_PAGE_SIZE", 10)?,
                max_page_size: get_parsed("LISTING_MAX_PAGE_SIZE", 100)?,
                empty_page_is_not_found: get_parsed("LISTING_EMPTY_PAGE_IS_NOT_FOUND", true)?,
            },
        })
    }

    /// In-memory storage with defaults; no environment lookups.
    pub fn in_memory() -> Self {
        SalesConfig {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            service_name: "sales-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            storage: StorageBackend::Memory,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
                acquire_timeout_secs: 5,
                run_migrations: false,
            },
            idempotency: IdempotencyConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
        }),
        Err(_) => Ok(default),
    }
}
