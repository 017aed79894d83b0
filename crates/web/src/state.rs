//! Application state shared across handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use petes_pets_core::CurrencyCode;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::db::{PetStore, PgPetStore};
use crate::services::avatar::{AvatarUploader, UploadError};
use crate::services::email::{MailgunMailer, Mailer, SendError};
use crate::services::payments::{PaymentError, PaymentProcessor, StripeClient};
use crate::services::storage::S3Storage;

/// Error building the external service clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientInitError {
    #[error("storage client: {0}")]
    Storage(#[from] UploadError),
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("mail client: {0}")]
    Mail(#[from] SendError),
}

/// Settings the checkout page and purchase workflow need.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Publishable key embedded in the checkout widget
    pub publishable_key: String,
    pub currency: CurrencyCode,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Every external dependency is
/// a trait object so tests can substitute in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pets: Arc<dyn PetStore>,
    avatars: AvatarUploader,
    payments: Arc<dyn PaymentProcessor>,
    mailer: Arc<dyn Mailer>,
    checkout: CheckoutSettings,
    upload_dir: PathBuf,
}

impl AppState {
    /// Create a new application state from already-built dependencies.
    #[must_use]
    pub fn new(
        pets: Arc<dyn PetStore>,
        avatars: AvatarUploader,
        payments: Arc<dyn PaymentProcessor>,
        mailer: Arc<dyn Mailer>,
        checkout: CheckoutSettings,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pets,
                avatars,
                payments,
                mailer,
                checkout,
                upload_dir,
            }),
        }
    }

    /// Build the production clients described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn from_config(config: &AppConfig, pool: PgPool) -> Result<Self, ClientInitError> {
        let storage = S3Storage::new(&config.storage)?;
        let avatars = AvatarUploader::new(Arc::new(storage), config.storage.path_prefix.clone());
        let payments = StripeClient::new(&config.stripe)?;
        let mailer = MailgunMailer::new(&config.mail)?;

        Ok(Self::new(
            Arc::new(PgPetStore::new(pool)),
            avatars,
            Arc::new(payments),
            Arc::new(mailer),
            CheckoutSettings {
                publishable_key: config.stripe.publishable_key.clone(),
                currency: config.stripe.currency,
            },
            config.upload_dir.clone(),
        ))
    }

    /// Get the pet store.
    #[must_use]
    pub fn pets(&self) -> &dyn PetStore {
        self.inner.pets.as_ref()
    }

    /// Get the avatar uploader.
    #[must_use]
    pub fn avatars(&self) -> &AvatarUploader {
        &self.inner.avatars
    }

    /// Get the payment processor.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProcessor {
        self.inner.payments.as_ref()
    }

    /// Get the mailer.
    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutSettings {
        &self.inner.checkout
    }

    /// Scratch directory for incoming multipart files.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.inner.upload_dir
    }
}
