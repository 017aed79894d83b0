//! Search route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use petes_pets_core::Pet;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::services::pets;
use crate::state::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub term: String,
}

/// Search results page.
#[derive(Template, WebTemplate)]
#[template(path = "search/index.html")]
pub struct SearchTemplate {
    pub term: String,
    pub pets: Vec<Pet>,
}

/// `{ "pets": [...] }`
#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub pets: Vec<Pet>,
}

/// Whether the client sent a JSON content type.
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"))
}

/// Full-text search; JSON for JSON clients, a rendered list otherwise.
#[instrument(skip(state, headers))]
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Result<Response> {
    let pets = pets::search_pets(&state, &query.term).await?;

    if wants_json(&headers) {
        return Ok(Json(SearchResults { pets }).into_response());
    }

    Ok(SearchTemplate {
        term: query.term,
        pets,
    }
    .into_response())
}
