//! `PostgreSQL` implementation of [`PetStore`].
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles
//! without a live database.

use async_trait::async_trait;
use petes_pets_core::{NewPet, Pet, PetId, PetUpdate};
use sqlx::PgPool;
use tracing::instrument;

use super::{PetStore, RepositoryError};

/// Pet store backed by the `pets` table.
#[derive(Clone)]
pub struct PgPetStore {
    pool: PgPool,
}

impl PgPetStore {
    /// Create a new store over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn not_found(id: PetId) -> RepositoryError {
    RepositoryError::NotFound(id.to_string())
}

#[async_trait]
impl PetStore for PgPetStore {
    #[instrument(skip(self, pet), fields(name = %pet.name))]
    async fn create(&self, pet: NewPet) -> Result<Pet, RepositoryError> {
        pet.validate()?;

        let created = sqlx::query_as::<_, Pet>(
            r"
            INSERT INTO pets (name, species, birthday, favorite_food, description, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, species, birthday, favorite_food, description,
                      price, avatar_url, created_at, updated_at
            ",
        )
        .bind(pet.name.trim())
        .bind(pet.species.trim())
        .bind(pet.birthday)
        .bind(pet.favorite_food)
        .bind(pet.description)
        .bind(pet.price)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(pet_id = %created.id, "Pet created");
        Ok(created)
    }

    async fn get_by_id(&self, id: PetId) -> Result<Pet, RepositoryError> {
        sqlx::query_as::<_, Pet>(
            r"
            SELECT id, name, species, birthday, favorite_food, description,
                   price, avatar_url, created_at, updated_at
            FROM pets
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    #[instrument(skip(self, update))]
    async fn update(&self, id: PetId, update: PetUpdate) -> Result<Pet, RepositoryError> {
        update.validate()?;

        let mut tx = self.pool.begin().await?;

        let mut pet = sqlx::query_as::<_, Pet>(
            r"
            SELECT id, name, species, birthday, favorite_food, description,
                   price, avatar_url, created_at, updated_at
            FROM pets
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found(id))?;

        update.apply_to(&mut pet);

        let updated = sqlx::query_as::<_, Pet>(
            r"
            UPDATE pets
            SET name = $2, species = $3, birthday = $4, favorite_food = $5,
                description = $6, price = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, species, birthday, favorite_food, description,
                      price, avatar_url, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(pet.birthday)
        .bind(&pet.favorite_food)
        .bind(&pet.description)
        .bind(pet.price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn set_avatar_url(&self, id: PetId, url: &str) -> Result<Pet, RepositoryError> {
        sqlx::query_as::<_, Pet>(
            r"
            UPDATE pets
            SET avatar_url = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, species, birthday, favorite_food, description,
                      price, avatar_url, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(id))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: PetId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM pets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search(&self, term: &str, limit: u32) -> Result<Vec<Pet>, RepositoryError> {
        let term = term.trim();
        if term.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        // websearch_to_tsquery never raises on user input
        let pets = sqlx::query_as::<_, Pet>(
            r"
            SELECT id, name, species, birthday, favorite_food, description,
                   price, avatar_url, created_at, updated_at
            FROM pets, websearch_to_tsquery('english', $1) AS query
            WHERE search_vector @@ query
            ORDER BY ts_rank(search_vector, query) DESC, created_at DESC
            LIMIT $2
            ",
        )
        .bind(term)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(pets)
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Pet>, RepositoryError> {
        let pets = sqlx::query_as::<_, Pet>(
            r"
            SELECT id, name, species, birthday, favorite_food, description,
                   price, avatar_url, created_at, updated_at
            FROM pets
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        Ok(pets)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pets")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
