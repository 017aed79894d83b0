//! Pet JSON API.
//!
//! Uses the same operations as the page routes and answers with JSON. Delete
//! still redirects to the home page, matching the page route.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::Redirect,
};
use petes_pets_core::{Pet, PetUpdate};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::routes::forms::read_pet_submission;
use crate::services::pets;
use crate::state::AppState;

/// `{ "pet": ... }`
#[derive(Debug, Serialize)]
pub struct PetEnvelope {
    pub pet: Pet,
}

/// Create a pet from a multipart body.
#[instrument(skip(state, multipart))]
pub async fn create(State(state): State<AppState>, multipart: Multipart) -> Result<Json<PetEnvelope>> {
    let mut submission = read_pet_submission(multipart, state.upload_dir()).await?;

    let new_pet = match submission.form.clone().into_new_pet() {
        Ok(new_pet) => new_pet,
        Err(invalid) => {
            submission.discard_avatar().await;
            return Err(AppError::Validation(invalid));
        }
    };

    let pet = pets::create_pet(&state, new_pet, submission.avatar).await?;
    Ok(Json(PetEnvelope { pet }))
}

#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PetEnvelope>> {
    let pet = pets::show_pet(&state, &id).await?;
    Ok(Json(PetEnvelope { pet }))
}

/// Merge a JSON `PetUpdate`; answers with the pet's page path.
#[instrument(skip(state, update))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PetUpdate>,
) -> Result<Json<String>> {
    let pet = pets::update_pet(&state, &id, update).await?;
    Ok(Json(format!("/pets/{}", pet.id)))
}

#[instrument(skip(state))]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Redirect> {
    pets::delete_pet(&state, &id).await?;
    Ok(Redirect::to("/"))
}
