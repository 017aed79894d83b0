//! Unified error handling with Sentry integration.
//!
//! Page and API handlers both return `Result<T, AppError>`, so both route
//! families answer failures with the same status codes and a JSON
//! `{ "err": "..." }` body. Server-side failures are captured to Sentry before
//! responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use petes_pets_core::ValidationError;
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::avatar::UploadError;
use crate::services::email::SendError;
use crate::services::payments::PaymentError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Required fields were missing or malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Avatar upload failed.
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    /// Charge failed.
    ///
    /// The purchase flow records a failed charge on its outcome and still
    /// redirects, so it never returns this. It exists so a handler that
    /// must fail on a charge can use `?` and get a 402.
    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),

    /// Email delivery failed. Receipts are best effort and only logged;
    /// this is the 502 for a handler that needs delivery to succeed.
    #[error("Email failed: {0}")]
    Send(#[from] SendError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => Self::Database(e),
            RepositoryError::Validation(e) => Self::Validation(e),
            RepositoryError::NotFound(id) => Self::NotFound(format!("pet {id}")),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::Upload(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Send(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_) | Self::Send(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::warn!(error = %self, "Request failed");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Send(_) => "External service error".to_string(),
            Self::Upload(err) => err.to_string(),
            _ => self.to_string(),
        };

        let body = match &self {
            Self::Validation(invalid) => json!({ "err": message, "errors": invalid.errors }),
            _ => json!({ "err": message }),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
