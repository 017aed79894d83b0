//! Integration tests for Pete's Pets.
//!
//! # Running Tests
//!
//! ```bash
//! # Apply migrations, then start the server
//! cargo run -p petes-pets-cli -- migrate
//! cargo run -p petes-pets-web
//!
//! # Run the ignored tests against it
//! cargo test -p petes-pets-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `http_pets` - Page and JSON routes over HTTP
//! - `pet_store` - `PgPetStore` against a real database

use reqwest::Client;
use reqwest::redirect::Policy;
use secrecy::SecretString;

/// Base URL of a running server (`PETS_BASE_URL`, default localhost:3000).
#[must_use]
pub fn base_url() -> String {
    std::env::var("PETS_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that reports redirects instead of following them.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// `DATABASE_URL` for store tests.
///
/// # Panics
///
/// Panics if the variable is unset.
#[must_use]
#[allow(clippy::expect_used)]
pub fn database_url() -> SecretString {
    std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .expect("DATABASE_URL must be set for store tests")
}
