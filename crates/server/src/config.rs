//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOCKLINE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOCKLINE_HOST` - Bind address (default: 127.0.0.1)
//! - `STOCKLINE_PORT` - Listen port (default: 3002)
//! - `STOCKLINE_VARIATION_MATCH_MODE` - `sequence` (default) or `set`
//! - `STOCKLINE_MAX_BATCH_ITEMS` - Largest accepted batch (default: 1000)
//! - `STOCKLINE_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `STOCKLINE_LOG_JSON` - Emit JSON logs when `true` (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)
//!
//! ## Optional (TLS)
//! - `STOCKLINE_TLS_CERT` - PEM-encoded certificate chain
//! - `STOCKLINE_TLS_KEY` - PEM-encoded private key

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use stockline_core::VariationMatchMode;

use crate::services::SyncOptions;

const DEFAULT_MAX_BATCH_ITEMS: usize = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// How barcode-less variations are matched
    pub match_mode: VariationMatchMode,
    /// Largest accepted batch of products or sales
    pub max_batch_items: usize,
    /// Requests running longer than this are aborted and rolled back
    pub request_timeout: Duration,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_lookup(env: &impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        match (env("STOCKLINE_TLS_CERT"), env("STOCKLINE_TLS_KEY")) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "STOCKLINE_TLS_*".to_string(),
                "Both STOCKLINE_TLS_CERT and STOCKLINE_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = env("STOCKLINE_DATABASE_URL")
            .or_else(|| env("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("STOCKLINE_DATABASE_URL".to_string()))?;

        let host = parse_or_default::<IpAddr>(&env, "STOCKLINE_HOST", "127.0.0.1")?;
        let port = parse_or_default::<u16>(&env, "STOCKLINE_PORT", "3002")?;
        let match_mode =
            parse_or_default::<VariationMatchMode>(&env, "STOCKLINE_VARIATION_MATCH_MODE", "sequence")?;

        let max_batch_items = parse_or_default::<usize>(
            &env,
            "STOCKLINE_MAX_BATCH_ITEMS",
            &DEFAULT_MAX_BATCH_ITEMS.to_string(),
        )?;
        if max_batch_items == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOCKLINE_MAX_BATCH_ITEMS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let timeout_secs = parse_or_default::<u64>(
            &env,
            "STOCKLINE_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOCKLINE_REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let log_json = parse_or_default::<bool>(&env, "STOCKLINE_LOG_JSON", "false")?;

        let sentry_dsn = env("SENTRY_DSN").filter(|dsn| !dsn.is_empty());
        let sentry_environment = env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_lookup(&env)?;

        Ok(Self {
            database_url,
            host,
            port,
            match_mode,
            max_batch_items,
            request_timeout: Duration::from_secs(timeout_secs),
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Options handed to the sync services.
    #[must_use]
    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            match_mode: self.match_mode,
            max_batch_items: self.max_batch_items,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse a variable, falling back to `default` when it is unset.
fn parse_or_default<T>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
