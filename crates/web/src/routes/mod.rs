//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (newest pets, ?page=)
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (store reachable)
//! GET  /search?term=           - Search (JSON if Content-Type: application/json)
//!
//! # Pet pages
//! GET    /pets/new             - Creation form
//! POST   /pets                 - Create (multipart, optional avatar); redirect to detail
//! GET    /pets/:id             - Detail page with checkout
//! GET    /pets/:id/edit        - Edit form
//! PUT    /pets/:id             - Update; redirect to detail
//! DELETE /pets/:id             - Delete; redirect home
//! POST   /pets/:id/purchase    - Purchase; redirect to detail
//!
//! # Pet API
//! POST   /api/pets             - Create (multipart); { pet }
//! GET    /api/pets/:id         - { pet }
//! PUT    /api/pets/:id         - Update (JSON); "/pets/:id"
//! DELETE /api/pets/:id         - Delete; redirect home
//! ```
//!
//! HTML forms reach `PUT` and `DELETE` through `?_method=` (see
//! [`crate::middleware::method_override`]).

pub mod api;
pub mod forms;
pub mod health;
pub mod home;
pub mod pets;
pub mod search;


use std::path::Path;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower::Layer;
use tower::util::MapRequestLayer;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{override_method, request_id_middleware};
use crate::state::AppState;
use forms::MAX_UPLOAD_BYTES;

/// Create the pet page routes router.
pub fn pet_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/pets",
            post(pets::create).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/pets/new", get(pets::new_page))
        .route(
            "/pets/{id}",
            get(pets::show).put(pets::update).delete(pets::delete),
        )
        .route("/pets/{id}/edit", get(pets::edit_page))
        .route("/pets/{id}/purchase", post(pets::purchase))
}

/// Create the pet API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(api::pets::create).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/{id}",
            get(api::pets::show)
                .put(api::pets::update)
                .delete(api::pets::delete),
        )
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/search", get(search::search))
        .merge(pet_routes())
        .nest("/api/pets", api_routes())
}

/// The complete application: routes, static files, and middleware.
pub fn app(state: AppState, static_dir: &Path) -> Router {
    let router = routes()
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state);

    // The override has to run before routing, so it wraps the whole router
    Router::new()
        .fallback_service(MapRequestLayer::new(override_method).layer(router))
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
