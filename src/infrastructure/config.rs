use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::value_objects::ConWindow;

const DEFAULT_DATABASE_URL: &str = "sqlite:./data/con-signup.db";
const DEFAULT_JWT_SECRET: &str = "con-signup-secret-key-change-in-production";
const DEFAULT_PORT: u16 = 9001;
const DEFAULT_START_OF_CON: &str = "2024-08-09T00:00:00Z";
const DEFAULT_END_OF_CON: &str = "2024-08-18T23:59:59Z";

/// `DATABASE_URL` value selecting the in-process store
pub const MEMORY_STORE: &str = "memory";

/// Runtime configuration, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub port: u16,
    pub window: ConWindow,
    pub lock_timeout: Duration,
    pub retry_attempts: u32,
    pub db_busy_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Invalid convention window: {0}")]
    Window(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL")
            .or_else(|| get("DB_PATH"))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set, using the development secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        let start = instant(&get, "START_OF_CON", DEFAULT_START_OF_CON)?;
        let end = instant(&get, "END_OF_CON", DEFAULT_END_OF_CON)?;
        let window = ConWindow::new(start, end).map_err(ConfigError::Window)?;

        Ok(Self {
            database_url,
            jwt_secret,
            port: number(&get, "PORT", DEFAULT_PORT)?,
            window,
            lock_timeout: Duration::from_millis(number(&get, "LOCK_TIMEOUT_MS", 2000)?),
            retry_attempts: number(&get, "RETRY_ATTEMPTS", 3)?,
            db_busy_timeout: Duration::from_millis(number(&get, "DB_BUSY_TIMEOUT_MS", 2000)?),
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_STORE
    }

    /// Database URL with the `sqlite:` scheme
    pub fn sqlite_url(&self) -> String {
        if self.database_url.starts_with("sqlite:") {
            self.database_url.clone()
        } else {
            format!("sqlite:{}", self.database_url)
        }
    }
}

fn instant<F>(get: &F, key: &'static str, default: &str) -> Result<DateTime<Utc>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = get(key).unwrap_or_else(|| {
        tracing::warn!("{} not set, defaulting to {}", key, default);
        default.to_string()
    });
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        })
}

fn number<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
