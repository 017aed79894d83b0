//! Stripe charges for pet purchases.
//!
//! A purchase is a single charge against a one-time token produced by the
//! Stripe Checkout widget. Failures are reported, never retried.

use async_trait::async_trait;
use petes_pets_core::{CurrencyCode, Price, PriceError};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::StripeConfig;

/// Errors that can occur when charging a payment token.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The token was missing, expired, or already used.
    #[error("invalid payment token: {0}")]
    InvalidToken(String),

    /// The card issuer declined the charge.
    #[error("payment declined: {0}")]
    Declined(String),

    /// HTTP request failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Processor returned some other error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The price cannot be expressed in minor units.
    #[error("invalid charge amount: {0}")]
    InvalidAmount(#[from] PriceError),
}

/// A single charge to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Amount in the currency's minor units (cents for USD)
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    pub description: String,
    /// One-time token from the checkout widget
    pub token: String,
}

impl ChargeRequest {
    /// Build a charge for `price`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` if the price overflows minor units.
    pub fn for_price(
        price: Price,
        currency: CurrencyCode,
        description: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        Ok(Self {
            amount_minor: price.to_minor_units()?,
            currency,
            description: description.into(),
            token: token.into(),
        })
    }
}

/// A completed charge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Confirmation {
    pub id: String,
    /// Charged amount in minor units
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

impl Confirmation {
    /// The charged amount converted back to major units.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the processor reported a negative amount.
    pub fn major_amount(&self) -> Result<Price, PriceError> {
        Price::from_minor_units(self.amount)
    }
}

/// Something that can capture a payment.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charge the token once.
    async fn charge(&self, request: &ChargeRequest) -> Result<Confirmation, PaymentError>;
}

/// Stripe error envelope.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    param: Option<String>,
}

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.clone(),
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[instrument(skip(self, request), fields(amount = request.amount_minor, currency = %request.currency))]
    async fn charge(&self, request: &ChargeRequest) -> Result<Confirmation, PaymentError> {
        let url = format!("{}/v1/charges", self.api_base);
        let amount = request.amount_minor.to_string();

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.secret_key.expose_secret())
            .form(&[
                ("amount", amount.as_str()),
                ("currency", request.currency.as_str()),
                ("description", request.description.as_str()),
                ("source", request.token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let confirmation: Confirmation = response.json().await?;
        tracing::info!(charge_id = %confirmation.id, status = %confirmation.status, "Charge created");
        Ok(confirmation)
    }
}

/// Map a Stripe error response onto [`PaymentError`].
fn classify_error(status: u16, body: &str) -> PaymentError {
    let Ok(parsed) = serde_json::from_str::<StripeErrorBody>(body) else {
        return PaymentError::Api {
            status,
            message: body.to_owned(),
        };
    };

    let detail = parsed.error;
    let rejects_token = detail.param.as_deref() == Some("source")
        || detail.code.as_deref() == Some("token_already_used");
    let message = detail.message.unwrap_or_else(|| detail.kind.clone());

    match detail.kind.as_str() {
        "invalid_request_error" if rejects_token => PaymentError::InvalidToken(message),
        "card_error" => PaymentError::Declined(message),
        _ => PaymentError::Api { status, message },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_request_uses_minor_units() {
        let request = ChargeRequest::for_price(
            Price::parse("25").unwrap(),
            CurrencyCode::Usd,
            "Purchased Rex, dog",
            "tok_visa",
        )
        .unwrap();
        assert_eq!(request.amount_minor, 2500);
        assert_eq!(request.currency.as_str(), "usd");
    }

    #[test]
    fn test_charge_request_at_largest_price() {
        let request = ChargeRequest::for_price(
            Price::parse("9999999999.99").unwrap(),
            CurrencyCode::Usd,
            "x",
            "tok",
        )
        .unwrap();
        assert_eq!(request.amount_minor, 999_999_999_999);
    }

    #[test]
    fn test_confirmation_major_amount() {
        let confirmation = Confirmation {
            id: "ch_1".to_owned(),
            amount: 2500,
            currency: "usd".to_owned(),
            status: "succeeded".to_owned(),
        };
        assert_eq!(confirmation.major_amount().unwrap(), Price::parse("25").unwrap());
    }

    #[test]
    fn test_classify_invalid_token() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","param":"source","message":"No such token: 'tok_bad'"}}"#;
        let err = classify_error(400, body);
        assert!(matches!(err, PaymentError::InvalidToken(ref m) if m.contains("tok_bad")));

        let body = r#"{"error":{"type":"invalid_request_error","code":"token_already_used","message":"You cannot use a Stripe token more than once"}}"#;
        assert!(matches!(classify_error(400, body), PaymentError::InvalidToken(_)));
    }

    #[test]
    fn test_classify_other_invalid_requests_as_api_errors() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"amount_too_small","param":"amount","message":"Amount must be at least 50 cents"}}"#;
        let err = classify_error(400, body);
        assert!(matches!(err, PaymentError::Api { status: 400, ref message } if message.contains("50 cents")));

        let body = r#"{"error":{"type":"invalid_request_error","message":"Invalid API Key provided"}}"#;
        assert!(matches!(classify_error(401, body), PaymentError::Api { status: 401, .. }));
    }

    #[test]
    fn test_classify_decline() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#;
        assert!(matches!(classify_error(402, body), PaymentError::Declined(_)));
    }

    #[test]
    fn test_classify_unknown_error() {
        let body = r#"{"error":{"type":"api_error"}}"#;
        let err = classify_error(500, body);
        assert!(matches!(err, PaymentError::Api { status: 500, ref message } if message == "api_error"));
    }

    #[test]
    fn test_classify_non_json() {
        let err = classify_error(502, "Bad Gateway");
        assert!(matches!(err, PaymentError::Api { status: 502, .. }));
    }
}
