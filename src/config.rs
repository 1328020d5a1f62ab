//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Ledger storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Postgres,
    /// Process-local ledger, lost on restart
    Memory,
}

impl FromStr for Storage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Storage::Postgres),
            "memory" => Ok(Storage::Memory),
            _ => Err(ConfigError::InvalidValue("STORAGE")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Ledger storage backend
    pub storage: Storage,

    /// Database connection URL (required for `Storage::Postgres`)
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Redis URL; summaries are cached in process when absent
    pub redis_url: Option<String>,

    /// HS256 signing secret for bearer tokens
    pub jwt_secret: String,

    /// Lifetime of issued tokens
    pub token_ttl: Duration,

    /// Lifetime of cached account summaries
    pub cache_ttl: Duration,

    /// Balance of accounts provisioned on first login
    pub initial_balance: i64,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// How long in-flight requests may run after a shutdown signal
    pub shutdown_grace: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage: Storage = lookup("STORAGE")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if storage == Storage::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;

        let redis_url = lookup("REDIS_URL").filter(|url| !url.is_empty());

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingEnv("JWT_SECRET"))?;

        let token_ttl = Duration::from_secs(parse_or(&lookup, "TOKEN_TTL_SECS", 86_400)?);
        let cache_ttl = Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", 1_800)?);

        let initial_balance: i64 = parse_or(&lookup, "INITIAL_BALANCE", 1_000)?;
        if initial_balance < 0 {
            return Err(ConfigError::InvalidValue("INITIAL_BALANCE"));
        }

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = parse_or(&lookup, "PORT", 8080)?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let shutdown_grace = Duration::from_secs(parse_or(&lookup, "SHUTDOWN_GRACE_SECS", 10)?);

        Ok(Self {
            storage,
            database_url,
            database_max_connections,
            redis_url,
            jwt_secret,
            token_ttl,
            cache_ttl,
            initial_balance,
            host,
            port,
            environment,
            shutdown_grace,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
