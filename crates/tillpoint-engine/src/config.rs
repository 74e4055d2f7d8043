//! Engine configuration.
//!
//! Configuration is loaded from `TILLPOINT_*` environment variables with
//! fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tillpoint_core::{
    Money, DEFAULT_PAYMENT_TERMS_DAYS, DEFAULT_WARRANTY_BUSINESS_DAYS, MATERIALITY_THRESHOLD_CENTS,
    SETTLED_EPSILON_CENTS,
};
use tillpoint_db::DbConfig;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite file, or `:memory:`
    pub database_path: PathBuf,

    /// Pool size bounds
    pub max_connections: u32,
    pub min_connections: u32,

    /// How long a writer waits for the database lock
    pub busy_timeout_ms: u64,

    /// Close-out variance (base cents) above which a note is required
    pub materiality_threshold_cents: i64,

    /// Outstanding amount (base cents) still treated as fully paid
    pub settled_epsilon_cents: i64,

    /// Warranty on delivered repairs, Sundays skipped
    pub warranty_business_days: u32,

    /// Credit terms for parties without their own
    pub default_terms_days: u32,

    /// ISO codes written on exchange-rate rows
    pub base_currency_code: String,
    pub secondary_currency_code: String,

    /// Buffered committed events per subscriber
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./tillpoint.db"),
            max_connections: 5,
            min_connections: 1,
            busy_timeout_ms: 5_000,
            materiality_threshold_cents: MATERIALITY_THRESHOLD_CENTS,
            settled_epsilon_cents: SETTLED_EPSILON_CENTS,
            warranty_business_days: DEFAULT_WARRANTY_BUSINESS_DAYS,
            default_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
            base_currency_code: "USD".to_string(),
            secondary_currency_code: "VES".to_string(),
            event_channel_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            database_path: lookup("TILLPOINT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(
                &lookup,
                "TILLPOINT_DB_MAX_CONNECTIONS",
                defaults.max_connections,
            )?,

            min_connections: parse_or(
                &lookup,
                "TILLPOINT_DB_MIN_CONNECTIONS",
                defaults.min_connections,
            )?,

            busy_timeout_ms: parse_or(
                &lookup,
                "TILLPOINT_BUSY_TIMEOUT_MS",
                defaults.busy_timeout_ms,
            )?,

            materiality_threshold_cents: parse_or(
                &lookup,
                "TILLPOINT_MATERIALITY_THRESHOLD_CENTS",
                defaults.materiality_threshold_cents,
            )?,

            settled_epsilon_cents: parse_or(
                &lookup,
                "TILLPOINT_SETTLED_EPSILON_CENTS",
                defaults.settled_epsilon_cents,
            )?,

            warranty_business_days: parse_or(
                &lookup,
                "TILLPOINT_WARRANTY_BUSINESS_DAYS",
                defaults.warranty_business_days,
            )?,

            default_terms_days: parse_or(
                &lookup,
                "TILLPOINT_DEFAULT_TERMS_DAYS",
                defaults.default_terms_days,
            )?,

            base_currency_code: lookup("TILLPOINT_BASE_CURRENCY")
                .unwrap_or(defaults.base_currency_code),

            secondary_currency_code: lookup("TILLPOINT_SECONDARY_CURRENCY")
                .unwrap_or(defaults.secondary_currency_code),

            event_channel_capacity: parse_or(
                &lookup,
                "TILLPOINT_EVENT_CHANNEL_CAPACITY",
                defaults.event_channel_capacity,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// In-memory database with default business rules (for tests).
    pub fn in_memory() -> Self {
        EngineConfig {
            database_path: PathBuf::from(":memory:"),
            ..EngineConfig::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 || self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue("TILLPOINT_DB_MIN_CONNECTIONS".to_string()));
        }
        if self.materiality_threshold_cents < 0 {
            return Err(ConfigError::InvalidValue(
                "TILLPOINT_MATERIALITY_THRESHOLD_CENTS".to_string(),
            ));
        }
        if self.settled_epsilon_cents < 0 {
            return Err(ConfigError::InvalidValue("TILLPOINT_SETTLED_EPSILON_CENTS".to_string()));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue("TILLPOINT_EVENT_CHANNEL_CAPACITY".to_string()));
        }
        if self.base_currency_code.trim().is_empty() {
            return Err(ConfigError::MissingRequired("TILLPOINT_BASE_CURRENCY".to_string()));
        }
        if self.secondary_currency_code.trim().is_empty() {
            return Err(ConfigError::MissingRequired("TILLPOINT_SECONDARY_CURRENCY".to_string()));
        }
        Ok(())
    }

    pub fn materiality_threshold(&self) -> Money {
        Money::from_cents(self.materiality_threshold_cents)
    }

    pub fn epsilon(&self) -> Money {
        Money::from_cents(self.settled_epsilon_cents)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Pool configuration for [`tillpoint_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let config = DbConfig::new(&self.database_path);
        if config.is_in_memory() {
            return DbConfig::in_memory().busy_timeout(self.busy_timeout());
        }
        config
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .busy_timeout(self.busy_timeout())
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
