//! Pet operations used by both route families.
//!
//! Page handlers render the results and API handlers serialize them; neither
//! talks to the store directly.

use std::path::PathBuf;

use petes_pets_core::{NewPet, Pet, PetId, PetUpdate};
use tracing::instrument;

use super::avatar::canonical_url;
use super::purchase::{PurchaseOutcome, PurchaseRequest, PurchaseWorkflow};
use crate::db::DEFAULT_SEARCH_LIMIT;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Pets shown per home page.
pub const PAGE_SIZE: u32 = 12;

/// Parse a path id. Anything that is not a valid id cannot name a pet.
///
/// # Errors
///
/// Returns `AppError::NotFound` if `raw` is not a pet id.
pub fn parse_pet_id(raw: &str) -> Result<PetId> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("pet {raw}")))
}

/// Create a pet, then upload its avatar if one was submitted.
///
/// An upload failure is returned as `AppError::Upload`, but the pet has
/// already been stored and stays without an avatar.
///
/// # Errors
///
/// Returns `AppError::Validation` for bad fields, `AppError::Upload` if the
/// avatar could not be stored.
#[instrument(skip(state, pet, avatar), fields(name = %pet.name, has_avatar = avatar.is_some()))]
pub async fn create_pet(state: &AppState, pet: NewPet, avatar: Option<PathBuf>) -> Result<Pet> {
    let created = match state.pets().create(pet).await {
        Ok(created) => created,
        Err(e) => {
            if let Some(path) = avatar {
                discard_upload(path).await;
            }
            return Err(e.into());
        }
    };

    let Some(path) = avatar else {
        return Ok(created);
    };

    let images = state.avatars().upload(&path).await?;
    let canonical = images
        .iter()
        .find_map(|image| canonical_url(&image.url))
        .ok_or_else(|| AppError::Internal("uploader returned no versioned URL".to_owned()))?;

    Ok(state.pets().set_avatar_url(created.id, &canonical).await?)
}

/// Remove a scratch upload that will never be processed.
pub async fn discard_upload(path: PathBuf) {
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove uploaded file");
    }
}

/// # Errors
///
/// Returns `AppError::NotFound` if no pet has this id.
pub async fn show_pet(state: &AppState, raw_id: &str) -> Result<Pet> {
    let id = parse_pet_id(raw_id)?;
    Ok(state.pets().get_by_id(id).await?)
}

/// Merge `update` into an existing pet.
///
/// # Errors
///
/// Returns `AppError::NotFound` or `AppError::Validation`.
#[instrument(skip(state, update))]
pub async fn update_pet(state: &AppState, raw_id: &str, update: PetUpdate) -> Result<Pet> {
    let id = parse_pet_id(raw_id)?;
    Ok(state.pets().update(id, update).await?)
}

/// # Errors
///
/// Returns `AppError::NotFound` if no pet has this id.
#[instrument(skip(state))]
pub async fn delete_pet(state: &AppState, raw_id: &str) -> Result<()> {
    let id = parse_pet_id(raw_id)?;
    state.pets().delete(id).await?;
    tracing::info!(pet_id = %id, "Pet deleted");
    Ok(())
}

/// Relevance-ordered search. A blank term matches nothing.
///
/// # Errors
///
/// Returns `AppError::Database` if the store fails.
#[instrument(skip(state))]
pub async fn search_pets(state: &AppState, term: &str) -> Result<Vec<Pet>> {
    Ok(state.pets().search(term, DEFAULT_SEARCH_LIMIT).await?)
}

/// One page of the home listing.
#[derive(Debug, Clone)]
pub struct PetPage {
    pub pets: Vec<Pet>,
    /// 1-based
    pub page: u32,
    pub total_pages: u32,
}

impl PetPage {
    #[must_use]
    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Newest pets first, [`PAGE_SIZE`] per page. Page numbers start at 1.
///
/// # Errors
///
/// Returns `AppError::Database` if the store fails.
pub async fn list_pets(state: &AppState, page: u32) -> Result<PetPage> {
    let page = page.max(1);
    let total = state.pets().count().await?;
    let total_pages = u32::try_from(total.div_ceil(u64::from(PAGE_SIZE)))
        .unwrap_or(u32::MAX)
        .max(1);
    let offset = (page - 1).saturating_mul(PAGE_SIZE);
    let pets = state.pets().list(PAGE_SIZE, offset).await?;

    Ok(PetPage {
        pets,
        page,
        total_pages,
    })
}

/// Run the purchase workflow with the state's dependencies.
pub async fn purchase_pet(state: &AppState, request: &PurchaseRequest) -> PurchaseOutcome {
    PurchaseWorkflow {
        pets: state.pets(),
        payments: state.payments(),
        mailer: state.mailer(),
        currency: state.checkout().currency,
    }
    .run(request)
    .await
}
