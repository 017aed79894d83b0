//! Transactional email for purchase notifications.
//!
//! Uses the Mailgun HTTP API via reqwest with Askama HTML and plain text
//! templates.

use askama::Template;
use async_trait::async_trait;
use petes_pets_core::{CurrencyCode, Email, Price};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use crate::config::MailConfig;

/// HTML template for the purchase confirmation.
#[derive(Template)]
#[template(path = "email/pet_purchased.html")]
struct PetPurchasedHtml<'a> {
    notice: &'a PurchaseNotice,
}

/// Plain text template for the purchase confirmation.
#[derive(Template)]
#[template(path = "email/pet_purchased.txt")]
struct PetPurchasedText<'a> {
    notice: &'a PurchaseNotice,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum SendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mail provider returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Context for the purchase confirmation email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseNotice {
    pub email: Email,
    /// Charged amount in major units
    pub amount: Price,
    pub currency: CurrencyCode,
    pub pet_name: String,
}

impl PurchaseNotice {
    /// Amount with currency symbol, e.g. "$25.00".
    #[must_use]
    pub fn display_amount(&self) -> String {
        self.amount.display(self.currency)
    }
}

/// Emails the application knows how to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    PetPurchased(PurchaseNotice),
}

/// A notification rendered into its final parts.
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject: &'static str,
    pub text: String,
    pub html: String,
}

impl Notification {
    /// Name of the template set used for this notification.
    #[must_use]
    pub const fn template_name(&self) -> &'static str {
        match self {
            Self::PetPurchased(_) => "pet_purchased",
        }
    }

    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::PetPurchased(_) => "Pet Purchased!",
        }
    }

    /// Render both bodies.
    ///
    /// # Errors
    ///
    /// Returns `SendError::Template` if a template fails to render.
    pub fn render(&self) -> Result<RenderedEmail, SendError> {
        let (text, html) = match self {
            Self::PetPurchased(notice) => (
                PetPurchasedText { notice }.render()?,
                PetPurchasedHtml { notice }.render()?,
            ),
        };
        Ok(RenderedEmail {
            subject: self.subject(),
            text,
            html,
        })
    }
}

/// Something that can deliver a notification.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `notification` to `to`, waiting for the provider to accept it.
    async fn send(&self, to: &Email, notification: &Notification) -> Result<(), SendError>;
}

/// Mailgun HTTP API mailer.
#[derive(Clone)]
pub struct MailgunMailer {
    client: reqwest::Client,
    api_key: SecretString,
    messages_url: String,
    from_address: String,
}

impl MailgunMailer {
    /// Create a new Mailgun mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MailConfig) -> Result<Self, SendError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            messages_url: format!("{}/v3/{}/messages", config.base_url, config.domain),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for MailgunMailer {
    #[instrument(skip(self, notification), fields(template = notification.template_name()))]
    async fn send(&self, to: &Email, notification: &Notification) -> Result<(), SendError> {
        let email = notification.render()?;

        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth("api", Some(self.api_key.expose_secret()))
            .form(&[
                ("from", self.from_address.as_str()),
                ("to", to.as_str()),
                ("subject", email.subject),
                ("text", email.text.as_str()),
                ("html", email.html.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}
