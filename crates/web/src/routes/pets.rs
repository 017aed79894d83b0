//! Pet page route handlers.
//!
//! Mutations redirect; reads render templates.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use petes_pets_core::{FieldError, Pet, PetForm};
use serde::Deserialize;
use tracing::instrument;

use super::forms::read_pet_submission;
use crate::error::{Result, add_breadcrumb};
use crate::services::pets;
use crate::services::purchase::{PurchaseOutcome, PurchaseRequest};
use crate::state::AppState;

/// New pet form.
#[derive(Template, WebTemplate)]
#[template(path = "pets/new.html")]
pub struct NewPetTemplate {
    pub form: PetForm,
    pub errors: Vec<FieldError>,
}

/// Pet detail page with checkout.
#[derive(Template, WebTemplate)]
#[template(path = "pets/show.html")]
pub struct ShowPetTemplate {
    pub pet: Pet,
    pub publishable_key: String,
    pub currency: String,
    /// Price in minor units, as the checkout widget expects
    pub amount_minor: i64,
}

/// Edit pet form.
#[derive(Template, WebTemplate)]
#[template(path = "pets/edit.html")]
pub struct EditPetTemplate {
    pub pet: Pet,
    pub errors: Vec<FieldError>,
}

/// Checkout form posted by the payment widget.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseForm {
    pub stripe_token: String,
    pub stripe_email: String,
    pub pet_id: Option<String>,
}

fn detail_path(id: impl std::fmt::Display) -> String {
    format!("/pets/{id}")
}

/// Whether a raw path id can be echoed back into a `Location` header.
fn is_path_safe(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Render the creation form.
pub async fn new_page() -> impl IntoResponse {
    NewPetTemplate {
        form: PetForm::default(),
        errors: Vec::new(),
    }
}

/// Create a pet from a multipart form, then redirect to it.
///
/// Invalid fields re-render the form. An avatar upload failure answers 400
/// with `{ "err": ... }`; the pet itself is kept.
#[instrument(skip(state, multipart))]
pub async fn create(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let mut submission = read_pet_submission(multipart, state.upload_dir()).await?;

    let new_pet = match submission.form.clone().into_new_pet() {
        Ok(new_pet) => new_pet,
        Err(invalid) => {
            submission.discard_avatar().await;
            let page = NewPetTemplate {
                form: submission.form,
                errors: invalid.errors,
            };
            return Ok((StatusCode::BAD_REQUEST, page).into_response());
        }
    };

    let pet = pets::create_pet(&state, new_pet, submission.avatar).await?;
    Ok(Redirect::to(&detail_path(pet.id)).into_response())
}

/// Render a pet's detail page.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let pet = pets::show_pet(&state, &id).await?;
    let checkout = state.checkout();

    Ok(ShowPetTemplate {
        amount_minor: pet.price.to_minor_units().unwrap_or_default(),
        publishable_key: checkout.publishable_key.clone(),
        currency: checkout.currency.as_str().to_owned(),
        pet,
    })
}

/// Render the edit form.
#[instrument(skip(state))]
pub async fn edit_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let pet = pets::show_pet(&state, &id).await?;
    Ok(EditPetTemplate {
        pet,
        errors: Vec::new(),
    })
}

/// Apply an edit form, then redirect to the detail page.
#[instrument(skip(state, form))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<PetForm>,
) -> Result<Response> {
    let update = match form.into_update() {
        Ok(update) => update,
        Err(invalid) => {
            let pet = pets::show_pet(&state, &id).await?;
            let page = EditPetTemplate {
                pet,
                errors: invalid.errors,
            };
            return Ok((StatusCode::BAD_REQUEST, page).into_response());
        }
    };

    let pet = pets::update_pet(&state, &id, update).await?;
    Ok(Redirect::to(&detail_path(pet.id)).into_response())
}

/// Delete a pet and go home.
#[instrument(skip(state))]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Redirect> {
    pets::delete_pet(&state, &id).await?;
    Ok(Redirect::to("/"))
}

/// Run the purchase workflow.
///
/// Always redirects to the pet's detail page; failures are logged, not shown.
#[instrument(skip(state, form))]
pub async fn purchase(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<PurchaseForm>,
) -> Redirect {
    add_breadcrumb("purchase", "Checkout submitted", Some(&[("pet_id", id.as_str())]));

    let request = PurchaseRequest {
        path_id: Some(id.clone()),
        body_pet_id: form.pet_id,
        token: form.stripe_token,
        email: form.stripe_email,
    };
    let outcome = pets::purchase_pet(&state, &request).await;

    if let PurchaseOutcome::ChargeFailed { error, .. } = &outcome {
        // Visible in Sentry even though the buyer only sees the redirect
        sentry::capture_error(error);
    }

    match outcome.pet_id() {
        Some(pet_id) => Redirect::to(&detail_path(pet_id)),
        None if is_path_safe(&id) => Redirect::to(&detail_path(&id)),
        None => Redirect::to("/"),
    }
}
