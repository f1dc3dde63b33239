//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CYNAPP_BASE_URL` - Backend origin (e.g. `https://shop.example.com/`)
//!
//! ## Optional
//! - `CYNAPP_LOCALE` - Locale path prefix and label language (default: en)
//! - `CYNAPP_DATA_DIR` - Directory for the durable credential store (default: .cynapp)
//! - `CYNAPP_REQUEST_TIMEOUT_SECS` - Transport timeout (default: 30)
//! - `CYNAPP_CHECKOUT_SETTLE_MS` - Delay before re-reading the cart after payment (default: 500)
//! - `CYNAPP_LOGIN_PATH` - Hosted login page, relative to the locale (default: auth/login?appMobileLogin=true)
//! - `CYNAPP_CATALOG_CACHE_SECS` - Catalog cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_LOCALE: &str = "en";
const DEFAULT_DATA_DIR: &str = ".cynapp";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CHECKOUT_SETTLE_MS: u64 = 500;
const DEFAULT_LOGIN_PATH: &str = "auth/login?appMobileLogin=true";
const DEFAULT_CATALOG_CACHE_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend origin; always ends with `/`
    pub base_url: Url,
    /// Locale used as API path prefix (`en/api/...`) and for labels
    pub locale: String,
    /// Directory backing the durable credential store
    pub data_dir: PathBuf,
    /// Per-request transport timeout
    pub request_timeout: Duration,
    /// Delay between a successful payment and the post-checkout cart refresh
    pub checkout_settle_delay: Duration,
    /// Hosted login page, relative to `<base_url>/<locale>/`
    pub login_path: String,
    /// Time-to-live for cached catalog pages
    pub catalog_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl StorefrontConfig {
    /// Configuration with defaults for everything but the backend origin.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: with_trailing_slash(base_url),
            locale: DEFAULT_LOCALE.to_owned(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            checkout_settle_delay: Duration::from_millis(DEFAULT_CHECKOUT_SETTLE_MS),
            login_path: DEFAULT_LOGIN_PATH.to_owned(),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

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
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_base = lookup("CYNAPP_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("CYNAPP_BASE_URL".to_string()))?;
        let base_url = Url::parse(&raw_base).map_err(|e| {
            ConfigError::InvalidEnvVar("CYNAPP_BASE_URL".to_string(), e.to_string())
        })?;

        let mut config = Self::new(base_url);

        if let Some(locale) = lookup("CYNAPP_LOCALE") {
            if locale.is_empty() || locale.contains('/') {
                return Err(ConfigError::InvalidEnvVar(
                    "CYNAPP_LOCALE".to_string(),
                    format!("not a language tag: {locale:?}"),
                ));
            }
            config.locale = locale;
        }
        if let Some(dir) = lookup("CYNAPP_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = parse_u64(&lookup, "CYNAPP_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_u64(&lookup, "CYNAPP_CHECKOUT_SETTLE_MS")? {
            config.checkout_settle_delay = Duration::from_millis(ms);
        }
        if let Some(path) = lookup("CYNAPP_LOGIN_PATH") {
            config.login_path = path.trim_start_matches('/').to_owned();
        }
        if let Some(secs) = parse_u64(&lookup, "CYNAPP_CATALOG_CACHE_SECS")? {
            config.catalog_cache_ttl = Duration::from_secs(secs);
        }
        config.sentry_dsn = lookup("SENTRY_DSN").filter(|s| !s.is_empty());
        config.sentry_environment = lookup("SENTRY_ENVIRONMENT").filter(|s| !s.is_empty());

        Ok(config)
    }

    /// The hosted login page URL.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the configured login path is not a valid
    /// relative URL.
    pub fn login_url(&self) -> Result<Url, url::ParseError> {
        self.base_url
            .join(&format!("{}/{}", self.locale, self.login_path))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Parse an optional unsigned integer variable.
fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}
