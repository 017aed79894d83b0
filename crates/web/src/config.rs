//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `S3_BUCKET` - Bucket that receives avatar images
//! - `S3_REGION` - Bucket region (e.g., us-west-1)
//! - `AWS_ACCESS_KEY_ID` - Access key for the bucket
//! - `AWS_SECRET_ACCESS_KEY` - Secret key for the bucket
//! - `PRIVATE_STRIPE_API_KEY` - Stripe secret key (`sk_...`)
//! - `PUBLIC_STRIPE_API_KEY` - Stripe publishable key (`pk_...`)
//! - `MAILGUN_API_KEY` - Mailgun sending key
//! - `EMAIL_DOMAIN` - Mailgun sending domain
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `S3_PATH` - Key prefix for avatars (default: pets/avatar)
//! - `S3_ENDPOINT` - Custom endpoint for S3-compatible storage
//! - `UPLOAD_DIR` - Scratch directory for incoming files (default: system temp dir)
//! - `STATIC_DIR` - Directory served under `/static` (default: crates/web/static)
//! - `PAYMENT_CURRENCY` - Charge currency (default: usd)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `MAILGUN_BASE_URL` - Mailgun API base URL (default: <https://api.mailgun.net>)
//! - `MAIL_FROM` - Sender address (default: no-reply@`EMAIL_DOMAIN`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use petes_pets_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Scratch directory for multipart uploads
    pub upload_dir: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Avatar object storage
    pub storage: StorageConfig,
    /// Payment processor
    pub stripe: StripeConfig,
    /// Transactional email
    pub mail: MailConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// S3 bucket settings for avatar uploads.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    /// Key prefix, without leading or trailing slash
    pub path_prefix: String,
    /// Endpoint override for S3-compatible services
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("path_prefix", &self.path_prefix)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Stripe settings.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    /// Publishable key (safe to expose in browser)
    pub publishable_key: String,
    pub api_base: String,
    pub currency: CurrencyCode,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish()
    }
}

/// Mailgun settings.
#[derive(Clone)]
pub struct MailConfig {
    pub api_key: SecretString,
    pub domain: String,
    pub base_url: String,
    pub from_address: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_key", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Source of configuration values, keyed by variable name.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl AppConfig {
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
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let database_url = get_required_secret(env, "DATABASE_URL")?;
        let host = parse_env(env, "HOST", "127.0.0.1")?;
        let port = parse_env(env, "PORT", "3000")?;
        let upload_dir = env("UPLOAD_DIR").map_or_else(std::env::temp_dir, PathBuf::from);
        let static_dir = PathBuf::from(get_env_or_default(env, "STATIC_DIR", "crates/web/static"));

        Ok(Self {
            database_url,
            host,
            port,
            upload_dir,
            static_dir,
            storage: StorageConfig::from_lookup(env)?,
            stripe: StripeConfig::from_lookup(env)?,
            mail: MailConfig::from_lookup(env)?,
            sentry_dsn: env("SENTRY_DSN"),
            sentry_environment: env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StorageConfig {
    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let path_prefix = get_env_or_default(env, "S3_PATH", "pets/avatar")
            .trim_matches('/')
            .to_owned();

        Ok(Self {
            bucket: get_required_env(env, "S3_BUCKET")?,
            region: get_required_env(env, "S3_REGION")?,
            access_key_id: get_required_env(env, "AWS_ACCESS_KEY_ID")?,
            secret_access_key: get_required_secret(env, "AWS_SECRET_ACCESS_KEY")?,
            path_prefix,
            endpoint: env("S3_ENDPOINT").map(|e| e.trim_end_matches('/').to_owned()),
        })
    }
}

impl StripeConfig {
    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let secret_key = get_required_secret(env, "PRIVATE_STRIPE_API_KEY")?;
        require_prefix(secret_key.expose_secret(), "sk_", "PRIVATE_STRIPE_API_KEY")?;
        let publishable_key = get_required_env(env, "PUBLIC_STRIPE_API_KEY")?;
        require_prefix(&publishable_key, "pk_", "PUBLIC_STRIPE_API_KEY")?;

        let currency = get_env_or_default(env, "PAYMENT_CURRENCY", "usd")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYMENT_CURRENCY".to_string(), e))?;

        Ok(Self {
            secret_key,
            publishable_key,
            api_base: get_env_or_default(env, "STRIPE_API_BASE", "https://api.stripe.com")
                .trim_end_matches('/')
                .to_owned(),
            currency,
        })
    }
}

impl MailConfig {
    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let domain = get_required_env(env, "EMAIL_DOMAIN")?;
        let from_address = env("MAIL_FROM").unwrap_or_else(|| format!("no-reply@{domain}"));

        Ok(Self {
            api_key: get_required_secret(env, "MAILGUN_API_KEY")?,
            base_url: get_env_or_default(env, "MAILGUN_BASE_URL", "https://api.mailgun.net")
                .trim_end_matches('/')
                .to_owned(),
            domain,
            from_address,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required, non-empty variable.
fn get_required_env(env: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    env(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required variable as a secret.
fn get_required_secret(env: Lookup<'_>, key: &str) -> Result<SecretString, ConfigError> {
    get_required_env(env, key).map(SecretString::from)
}

/// Get a variable with a default value.
fn get_env_or_default(env: Lookup<'_>, key: &str, default: &str) -> String {
    env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable (or its default) with `FromStr`.
fn parse_env<T>(env: Lookup<'_>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(env, key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Reject keys from the wrong Stripe key family.
fn require_prefix(value: &str, prefix: &str, key: &str) -> Result<(), ConfigError> {
    if value.starts_with(prefix) {
        Ok(())
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a key starting with '{prefix}'"),
        ))
    }
}
