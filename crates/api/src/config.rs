use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use roster_directory::DirectoryConfig;
use roster_events::{BusConfig, OverflowPolicy};

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines (default).
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Public API port (default: `3000`).
    pub port: u16,
    /// Management (health) port (default: `3001`).
    pub management_port: u16,
    /// PostgreSQL URL. When unset the in-memory store is used.
    pub database_url: Option<String>,
    /// Deadline for a single store call in seconds (default: `5`).
    pub store_timeout_secs: u64,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// Buffered events per bus subscription (default: `1`).
    pub event_buffer: usize,
    /// How long a publish waits on a full subscriber, in milliseconds.
    /// `0` waits forever (default: `1000`).
    pub publish_timeout_ms: u64,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            management_port: 3001,
            database_url: None,
            store_timeout_secs: 5,
            request_timeout_secs: 30,
            cors_origins: vec!["http://localhost:5173".into()],
            event_buffer: 1,
            publish_timeout_ms: 1000,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `MANAGEMENT_PORT`      | `3001`                     |
    /// | `DATABASE_URL`         | unset (in-memory store)    |
    /// | `STORE_TIMEOUT_SECS`   | `5`                        |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `EVENT_BUFFER`         | `1`                        |
    /// | `PUBLISH_TIMEOUT_MS`   | `1000`                     |
    /// | `LOG_FORMAT`           | `pretty`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => defaults.cors_origins,
        };

        let event_buffer: usize = parse_or(&lookup, "EVENT_BUFFER", defaults.event_buffer)?;
        if event_buffer == 0 {
            return Err(ConfigError::Invalid {
                var: "EVENT_BUFFER",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            management_port: parse_or(&lookup, "MANAGEMENT_PORT", defaults.management_port)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            store_timeout_secs: parse_or(
                &lookup,
                "STORE_TIMEOUT_SECS",
                defaults.store_timeout_secs,
            )?,
            request_timeout_secs: parse_or(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            cors_origins,
            event_buffer,
            publish_timeout_ms: parse_or(
                &lookup,
                "PUBLISH_TIMEOUT_MS",
                defaults.publish_timeout_ms,
            )?,
            log_format: parse_or(&lookup, "LOG_FORMAT", defaults.log_format)?,
        })
    }

    /// Event bus settings derived from `EVENT_BUFFER` and `PUBLISH_TIMEOUT_MS`.
    pub fn bus_config(&self) -> BusConfig {
        let overflow = match self.publish_timeout_ms {
            0 => OverflowPolicy::Block,
            ms => OverflowPolicy::Timeout(Duration::from_millis(ms)),
        };
        BusConfig {
            capacity: self.event_buffer,
            overflow,
        }
    }

    pub fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            store_timeout: Duration::from_secs(self.store_timeout_secs),
        }
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map(|_| origin.to_string())
                .map_err(|e| ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}
