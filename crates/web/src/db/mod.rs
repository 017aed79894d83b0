//! Persistence for pet records.
//!
//! # Database: `petes_pets`
//!
//! ## Tables
//!
//! - `pets` - Pet listings, with a generated `search_vector` column for
//!   relevance-ranked full-text search
//!
//! # Migrations
//!
//! Migrations are stored in `crates/web/migrations/` and run via:
//! ```bash
//! cargo run -p petes-pets-cli -- migrate
//! ```

pub mod pets;

use std::time::Duration;

use async_trait::async_trait;
use petes_pets_core::{NewPet, Pet, PetId, PetUpdate, ValidationError};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use pets::PgPetStore;

/// Default number of search results.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Errors from pet persistence.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Required fields were missing or malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Requested pet was not found.
    #[error("pet not found: {0}")]
    NotFound(String),
}

/// Storage contract for pet records.
///
/// Every implementation validates input before writing and reports a missing
/// record as `RepositoryError::NotFound` rather than an empty result.
#[async_trait]
pub trait PetStore: Send + Sync {
    /// Insert a new pet and return it with its assigned id.
    async fn create(&self, pet: NewPet) -> Result<Pet, RepositoryError>;

    /// Fetch one pet.
    async fn get_by_id(&self, id: PetId) -> Result<Pet, RepositoryError>;

    /// Merge the supplied fields into an existing pet.
    async fn update(&self, id: PetId, update: PetUpdate) -> Result<Pet, RepositoryError>;

    /// Replace the pet's canonical avatar URL.
    async fn set_avatar_url(&self, id: PetId, url: &str) -> Result<Pet, RepositoryError>;

    /// Remove a pet.
    async fn delete(&self, id: PetId) -> Result<(), RepositoryError>;

    /// Full-text search ordered by descending relevance, at most `limit` results.
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<Pet>, RepositoryError>;

    /// Newest pets first.
    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Pet>, RepositoryError>;

    /// Total number of pets.
    async fn count(&self) -> Result<u64, RepositoryError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
