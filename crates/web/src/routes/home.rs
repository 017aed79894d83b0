//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::Result;
use crate::services::pets::{self, PetPage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub page: Option<u32>,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home/index.html")]
pub struct HomeTemplate {
    pub listing: PetPage,
}

/// Home page: newest pets, paginated.
#[instrument(skip(state))]
pub async fn home(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> Result<impl IntoResponse> {
    let listing = pets::list_pets(&state, query.page.unwrap_or(1)).await?;
    Ok(HomeTemplate { listing })
}
