//! Process configuration
//!
//! Values come from the environment (optionally seeded from a `.env` file).
//! Per-job schedules are not configured here; they live in the `sync_jobs`
//! table so they can be changed at runtime.

use crate::error::{AppError, Result};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const ENV_PREFIX: &str = "ASHARE_SYNC_";

/// Runtime configuration of the sync service
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_pool_size: u32,
    pub provider_url: String,
    pub provider_timeout: Duration,
    pub fetch_max_attempts: u32,
    pub fetch_base_delay: Duration,
    pub sync_workers: usize,
    pub realtime_workers: usize,
    pub market_tz: Tz,
    pub control: ControlConfig,
}

/// Operations control server settings
#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            db_pool_size: 8,
            provider_url: "http://127.0.0.1:8080".to_string(),
            provider_timeout: Duration::from_secs(30),
            fetch_max_attempts: 3,
            fetch_base_delay: Duration::from_millis(1000),
            sync_workers: 3,
            realtime_workers: 6,
            market_tz: chrono_tz::Asia::Shanghai,
            control: ControlConfig {
                enabled: true,
                host: "127.0.0.1".to_string(),
                port: 5010,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Keys are given without the `ASHARE_SYNC_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            db_pool_size: parse_or("DB_POOL_SIZE", get("DB_POOL_SIZE"), defaults.db_pool_size)?,
            provider_url: get("PROVIDER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.provider_url),
            provider_timeout: Duration::from_secs(parse_or(
                "PROVIDER_TIMEOUT_SECS",
                get("PROVIDER_TIMEOUT_SECS"),
                defaults.provider_timeout.as_secs(),
            )?),
            fetch_max_attempts: parse_or(
                "FETCH_MAX_ATTEMPTS",
                get("FETCH_MAX_ATTEMPTS"),
                defaults.fetch_max_attempts,
            )?,
            fetch_base_delay: Duration::from_millis(parse_or(
                "FETCH_BASE_DELAY_MS",
                get("FETCH_BASE_DELAY_MS"),
                defaults.fetch_base_delay.as_millis() as u64,
            )?),
            sync_workers: parse_or("WORKERS", get("WORKERS"), defaults.sync_workers)?,
            realtime_workers: parse_or(
                "REALTIME_WORKERS",
                get("REALTIME_WORKERS"),
                defaults.realtime_workers,
            )?,
            market_tz: match get("MARKET_TZ") {
                Some(name) => parse_timezone(&name)?,
                None => defaults.market_tz,
            },
            control: ControlConfig {
                enabled: match get("CONTROL_ENABLED") {
                    Some(v) => v.eq_ignore_ascii_case("true") || v == "1",
                    None => defaults.control.enabled,
                },
                host: get("CONTROL_HOST").unwrap_or(defaults.control.host),
                port: parse_or("CONTROL_PORT", get("CONTROL_PORT"), defaults.control.port)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.db_pool_size == 0 {
            return Err(AppError::Config("DB_POOL_SIZE must be at least 1".to_string()));
        }
        if self.fetch_max_attempts == 0 {
            return Err(AppError::Config(
                "FETCH_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.sync_workers == 0 || self.realtime_workers == 0 {
            return Err(AppError::Config("worker counts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("ashare_sync.db")
    }
}

/// Parse an IANA timezone name such as `Asia/Shanghai`
pub fn parse_timezone(name: &str) -> Result<Tz> {
    Tz::from_str(name).map_err(|_| AppError::Config(format!("Unknown timezone: {}", name)))
}

fn parse_or<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(value) => value.parse::<T>().map_err(|_| {
            AppError::Config(format!("Invalid value for {}{}: {}", ENV_PREFIX, name, value))
        }),
        None => Ok(default),
    }
}
