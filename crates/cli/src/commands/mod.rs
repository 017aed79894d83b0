//! CLI command implementations.

pub mod migrate;
pub mod seed;

use secrecy::SecretString;

/// Read `DATABASE_URL`, loading `.env` first if present.
///
/// # Errors
///
/// Returns `MissingDatabaseUrl` if the variable is unset.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}

#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: DATABASE_URL")]
pub struct MissingDatabaseUrl;
