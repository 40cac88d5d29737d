/**
 * Server Configuration
 *
 * This module handles loading and validation of server configuration and
 * the optional PostgreSQL database connection.
 *
 * # Configuration Sources
 *
 * Later sources override earlier ones:
 *
 * 1. Built-in defaults
 * 2. TOML file named by `STOCKROOM_CONFIG`, if set
 * 3. Environment variables (`.env` is loaded by the binary via `dotenv`)
 *
 * | Key | Environment | Default |
 * |---|---|---|
 * | `bind_addr` | `BIND_ADDR`, or `SERVER_PORT` on `0.0.0.0` | `0.0.0.0:3000` |
 * | `database_url` | `DATABASE_URL` | none (in-memory stores) |
 * | `jwt_secret` | `JWT_SECRET` | development secret, with a warning |
 * | `token_ttl_hours` | `TOKEN_TTL_HOURS` | `24` |
 * | `log_level` | `LOG_LEVEL` | `info` |
 * | `audit_history_limit` | `AUDIT_HISTORY_LIMIT` | `50` |
 *
 * # Error Handling
 *
 * Invalid values stop startup with a `ConfigError`. A missing or unreachable
 * database does not: the server logs a warning and runs on in-memory stores.
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::backend::audit::recorder::MAX_LIMIT;

pub const CONFIG_PATH_VAR: &str = "STOCKROOM_CONFIG";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_AUDIT_HISTORY_LIMIT: usize = 50;
const DEVELOPMENT_JWT_SECRET: &str = "stockroom-development-secret";
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Validated server configuration
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub log_level: String,
    pub audit_history_limit: usize,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Defaults, then the optional TOML file, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ServerConfigBuilder::default();
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            builder = builder.merge(ServerConfigBuilder::from_file(&path)?);
        }
        let config = builder.merge(ServerConfigBuilder::from_env()?).build()?;

        if config.uses_development_secret() {
            tracing::warn!("JWT_SECRET not set. Using the development secret.");
        }
        Ok(config)
    }

    /// Whether the built-in development secret is in use.
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("log_level", &self.log_level)
            .field("audit_history_limit", &self.audit_history_limit)
            .finish()
    }
}

/// Partial configuration, as read from one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfigBuilder {
    bind_addr: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    token_ttl_hours: Option<i64>,
    log_level: Option<String>,
    audit_history_limit: Option<usize>,
}

impl ServerConfigBuilder {
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = Some(addr.into());
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    pub fn token_ttl_hours(mut self, hours: i64) -> Self {
        self.token_ttl_hours = Some(hours);
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn audit_history_limit(mut self, limit: usize) -> Self {
        self.audit_history_limit = Some(limit);
        self
    }

    /// Values set in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            bind_addr: other.bind_addr.or(self.bind_addr),
            database_url: other.database_url.or(self.database_url),
            jwt_secret: other.jwt_secret.or(self.jwt_secret),
            token_ttl_hours: other.token_ttl_hours.or(self.token_ttl_hours),
            log_level: other.log_level.or(self.log_level),
            audit_history_limit: other.audit_history_limit.or(self.audit_history_limit),
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Read the recognised environment variables. Empty values count as unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env_var("BIND_ADDR")
            .or_else(|| env_var("SERVER_PORT").map(|port| format!("0.0.0.0:{}", port)));

        Ok(Self {
            bind_addr,
            database_url: env_var("DATABASE_URL"),
            jwt_secret: env_var("JWT_SECRET"),
            token_ttl_hours: env_parse("TOKEN_TTL_HOURS", "token_ttl_hours")?,
            log_level: env_var("LOG_LEVEL"),
            audit_history_limit: env_parse("AUDIT_HISTORY_LIMIT", "audit_history_limit")?,
        })
    }

    /// Apply defaults and validate.
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let bind_addr = self
            .bind_addr
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::invalid("bind_addr", e.to_string()))?;

        let jwt_secret = self
            .jwt_secret
            .unwrap_or_else(|| DEVELOPMENT_JWT_SECRET.to_string());
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::invalid("jwt_secret", "must not be empty"));
        }

        let token_ttl_hours = self.token_ttl_hours.unwrap_or(DEFAULT_TOKEN_TTL_HOURS);
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::invalid(
                "token_ttl_hours",
                format!("must be between 1 and {}", MAX_TOKEN_TTL_HOURS),
            ));
        }

        let audit_history_limit = self
            .audit_history_limit
            .unwrap_or(DEFAULT_AUDIT_HISTORY_LIMIT);
        if !(1..=MAX_LIMIT).contains(&audit_history_limit) {
            return Err(ConfigError::invalid(
                "audit_history_limit",
                format!("must be between 1 and {}", MAX_LIMIT),
            ));
        }

        Ok(ServerConfig {
            bind_addr,
            database_url: self.database_url.filter(|url| !url.trim().is_empty()),
            jwt_secret,
            token_ttl_hours,
            log_level: self
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            audit_history_limit,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(name: &str, field: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    env_var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(field, format!("{} ({}={})", e, name, value)))
        })
        .transpose()
}

/// Connect to PostgreSQL and run migrations
///
/// Returns `None` when no database is configured or the connection fails;
/// the server then runs on in-memory stores.
pub async fn load_database(config: &ServerConfig) -> Option<PgPool> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set. Using in-memory stores; data will not persist.");
        return None;
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Falling back to in-memory stores.");
            return None;
        }
    };

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}
