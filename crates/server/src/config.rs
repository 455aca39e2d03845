//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `DATABASE_URL` - `SQLite` connection string (default: `sqlite://inventory.db?mode=rwc`)
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 5000)
//! - `BASE_URL` - Public URL; `https://` enables secure cookies (default: `http://localhost:5000`)
//! - `ITEMS_PER_PAGE` - Rows per list page (default: 20)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

/// Default `SQLite` database, created on first start.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://inventory.db?mode=rwc";

const DEFAULT_ITEMS_PER_PAGE: u32 = 20;
const MAX_ITEMS_PER_PAGE: u32 = 500;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Database connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Rows per page in list views
    pub items_per_page: u32,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Log output format
    pub log_format: LogFormat,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("items_per_page", &self.items_per_page)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .field("sentry_sample_rate", &self.sentry_sample_rate)
            .field("sentry_traces_sample_rate", &self.sentry_traces_sample_rate)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and `.env` if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_owned());

        let database_url = SecretString::from(or_default("DATABASE_URL", DEFAULT_DATABASE_URL));
        let host = or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = or_default("PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let base_url = or_default("BASE_URL", "http://localhost:5000")
            .trim_end_matches('/')
            .to_owned();
        let items_per_page = parse_items_per_page(get("ITEMS_PER_PAGE").as_deref())?;

        let sentry_dsn = get("SENTRY_DSN").filter(|s| !s.is_empty());
        let sentry_environment = get("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let log_format = match get("LOG_FORMAT").as_deref() {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            items_per_page,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            log_format,
        })
    }

    /// Default configuration pointed at the given database.
    #[must_use]
    pub fn for_database(database_url: &str) -> Self {
        Self {
            database_url: SecretString::from(database_url.to_owned()),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            base_url: "http://localhost:5000".to_owned(),
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            log_format: LogFormat::Text,
        }
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the app is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn parse_items_per_page(value: Option<&str>) -> Result<u32, ConfigError> {
    let Some(value) = value else {
        return Ok(DEFAULT_ITEMS_PER_PAGE);
    };
    match value.trim().parse::<u32>() {
        Ok(n) if (1..=MAX_ITEMS_PER_PAGE).contains(&n) => Ok(n),
        Ok(n) => Err(ConfigError::InvalidEnvVar(
            "ITEMS_PER_PAGE".to_string(),
            format!("must be between 1 and {MAX_ITEMS_PER_PAGE} (got {n})"),
        )),
        Err(e) => Err(ConfigError::InvalidEnvVar(
            "ITEMS_PER_PAGE".to_string(),
            e.to_string(),
        )),
    }
}
