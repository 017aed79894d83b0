//! The purchase workflow: look up a pet, charge for it, email a receipt.
//!
//! ```text
//! Started -> PetLookedUp -> Charged -> Notified -> Completed
//!    |            |
//!    v            v
//! LookupFailed  ChargeFailed
//! ```
//!
//! A failed notification still completes; the charge is never reversed.
//! Concurrent purchases of the same pet are not serialized.

use std::fmt;

use petes_pets_core::{CurrencyCode, Email, Pet, PetId};
use tracing::instrument;

use super::email::{Mailer, Notification, PurchaseNotice};
use super::payments::{ChargeRequest, Confirmation, PaymentError, PaymentProcessor};
use crate::db::{PetStore, RepositoryError};

/// Workflow states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseState {
    Started,
    PetLookedUp,
    Charged,
    Notified,
    Completed,
    LookupFailed,
    ChargeFailed,
}

impl fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::PetLookedUp => "pet_looked_up",
            Self::Charged => "charged",
            Self::Notified => "notified",
            Self::Completed => "completed",
            Self::LookupFailed => "lookup_failed",
            Self::ChargeFailed => "charge_failed",
        };
        f.write_str(name)
    }
}

/// Input to a purchase, as submitted by the checkout form.
#[derive(Debug, Clone, Default)]
pub struct PurchaseRequest {
    /// Raw id from the route path
    pub path_id: Option<String>,
    /// Raw `petId` from the form body
    pub body_pet_id: Option<String>,
    /// One-time payment token
    pub token: String,
    /// Buyer's address for the receipt
    pub email: String,
}

impl PurchaseRequest {
    /// The pet to buy: the path id if it is a valid id, else the body id.
    #[must_use]
    pub fn resolve_pet_id(&self) -> Option<PetId> {
        [self.path_id.as_deref(), self.body_pet_id.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|raw| raw.parse().ok())
    }
}

/// How a purchase ended.
#[derive(Debug)]
pub enum PurchaseOutcome {
    /// Charged; `notified` records whether the receipt went out.
    Completed {
        pet_id: PetId,
        confirmation: Confirmation,
        notified: bool,
    },
    /// No pet to buy.
    LookupFailed { reason: String },
    /// The charge did not go through. Nothing was charged or sent.
    ChargeFailed { pet_id: PetId, error: PaymentError },
}

impl PurchaseOutcome {
    #[must_use]
    pub const fn state(&self) -> PurchaseState {
        match self {
            Self::Completed { .. } => PurchaseState::Completed,
            Self::LookupFailed { .. } => PurchaseState::LookupFailed,
            Self::ChargeFailed { .. } => PurchaseState::ChargeFailed,
        }
    }

    /// The pet the purchase resolved to, if any.
    #[must_use]
    pub const fn pet_id(&self) -> Option<PetId> {
        match self {
            Self::Completed { pet_id, .. } | Self::ChargeFailed { pet_id, .. } => Some(*pet_id),
            Self::LookupFailed { .. } => None,
        }
    }
}

/// Dependencies of one purchase.
pub struct PurchaseWorkflow<'a> {
    pub pets: &'a dyn PetStore,
    pub payments: &'a dyn PaymentProcessor,
    pub mailer: &'a dyn Mailer,
    pub currency: CurrencyCode,
}

impl PurchaseWorkflow<'_> {
    /// Run the purchase to a terminal state. Steps run strictly in order.
    #[instrument(skip_all, fields(path_id = ?request.path_id))]
    pub async fn run(&self, request: &PurchaseRequest) -> PurchaseOutcome {
        transition(PurchaseState::Started);

        let pet = match self.look_up(request).await {
            Ok(pet) => pet,
            Err(reason) => {
                tracing::warn!(%reason, "Purchase lookup failed");
                transition(PurchaseState::LookupFailed);
                return PurchaseOutcome::LookupFailed { reason };
            }
        };
        transition(PurchaseState::PetLookedUp);

        let confirmation = match self.charge(&pet, &request.token).await {
            Ok(confirmation) => confirmation,
            Err(error) => {
                tracing::warn!(pet_id = %pet.id, error = %error, "Charge failed");
                transition(PurchaseState::ChargeFailed);
                return PurchaseOutcome::ChargeFailed {
                    pet_id: pet.id,
                    error,
                };
            }
        };
        transition(PurchaseState::Charged);

        let notified = self.notify(&pet, &confirmation, &request.email).await;
        if notified {
            transition(PurchaseState::Notified);
        }

        transition(PurchaseState::Completed);
        PurchaseOutcome::Completed {
            pet_id: pet.id,
            confirmation,
            notified,
        }
    }

    async fn look_up(&self, request: &PurchaseRequest) -> Result<Pet, String> {
        let id = request
            .resolve_pet_id()
            .ok_or_else(|| "no pet id supplied".to_owned())?;

        self.pets.get_by_id(id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => format!("pet {id} not found"),
            other => other.to_string(),
        })
    }

    async fn charge(&self, pet: &Pet, token: &str) -> Result<Confirmation, PaymentError> {
        let request = ChargeRequest::for_price(
            pet.price,
            self.currency,
            format!("Purchased {}, {}", pet.name, pet.species),
            token,
        )?;
        self.payments.charge(&request).await
    }

    /// Best effort. Failures are logged and reported as `false`.
    async fn notify(&self, pet: &Pet, confirmation: &Confirmation, email: &str) -> bool {
        let to = match Email::parse(email) {
            Ok(to) => to,
            Err(e) => {
                tracing::warn!(error = %e, "Not sending receipt to invalid address");
                return false;
            }
        };

        let amount = confirmation.major_amount().unwrap_or(pet.price);
        let notification = Notification::PetPurchased(PurchaseNotice {
            email: to.clone(),
            amount,
            currency: self.currency,
            pet_name: pet.name.clone(),
        });

        match self.mailer.send(&to, &notification).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(pet_id = %pet.id, error = %e, "Failed to send purchase receipt");
                false
            }
        }
    }
}

fn transition(state: PurchaseState) {
    tracing::info!(%state, "Purchase state");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use petes_pets_core::Price;

    use super::*;
    use crate::testing::{MemoryPetStore, RecordingMailer, ScriptedPayments, new_pet};

    struct Harness {
        pets: MemoryPetStore,
        payments: ScriptedPayments,
        mailer: RecordingMailer,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                pets: MemoryPetStore::default(),
                payments: ScriptedPayments::default(),
                mailer: RecordingMailer::default(),
            }
        }

        fn workflow(&self) -> PurchaseWorkflow<'_> {
            PurchaseWorkflow {
                pets: &self.pets,
                payments: &self.payments,
                mailer: &self.mailer,
                currency: CurrencyCode::Usd,
            }
        }

        async fn rex(&self) -> Pet {
            self.pets.create(new_pet("Rex", "dog", "25")).await.unwrap()
        }
    }

    fn request(path_id: Option<String>, body_pet_id: Option<String>) -> PurchaseRequest {
        PurchaseRequest {
            path_id,
            body_pet_id,
            token: "tok_visa".to_owned(),
            email: "buyer@example.com".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_charges_minor_units_and_notifies() {
        let h = Harness::new();
        let pet = h.rex().await;

        let outcome = h
            .workflow()
            .run(&request(Some(pet.id.to_string()), None))
            .await;

        assert_eq!(outcome.state(), PurchaseState::Completed);
        assert_eq!(outcome.pet_id(), Some(pet.id));
        assert!(matches!(outcome, PurchaseOutcome::Completed { notified: true, .. }));

        let charges = h.payments.charges();
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].amount_minor, 2500);
        assert_eq!(charges[0].currency.as_str(), "usd");
        assert_eq!(charges[0].description, "Purchased Rex, dog");
        assert_eq!(charges[0].token, "tok_visa");

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        let (to, Notification::PetPurchased(notice)) = &sent[0];
        assert_eq!(to.as_str(), "buyer@example.com");
        assert_eq!(notice.email.as_str(), "buyer@example.com");
        assert_eq!(notice.amount, Price::parse("25").unwrap());
        assert_eq!(notice.pet_name, "Rex");
    }

    #[tokio::test]
    async fn test_invalid_token_skips_notification() {
        let h = Harness::new();
        let pet = h.rex().await;
        h.payments
            .fail_with(|| PaymentError::InvalidToken("No such token".to_owned()));

        let outcome = h
            .workflow()
            .run(&request(Some(pet.id.to_string()), None))
            .await;

        assert_eq!(outcome.state(), PurchaseState::ChargeFailed);
        assert_eq!(outcome.pet_id(), Some(pet.id));
        assert!(h.mailer.sent().is_empty());
        assert_eq!(h.payments.successful_charges(), 0);
    }

    #[tokio::test]
    async fn test_mail_failure_still_completes() {
        let h = Harness::new();
        let pet = h.rex().await;
        h.mailer.fail();

        let outcome = h
            .workflow()
            .run(&request(Some(pet.id.to_string()), None))
            .await;

        assert!(matches!(
            outcome,
            PurchaseOutcome::Completed { notified: false, .. }
        ));
        assert_eq!(h.payments.successful_charges(), 1);
    }

    #[tokio::test]
    async fn test_invalid_email_still_completes() {
        let h = Harness::new();
        let pet = h.rex().await;
        let mut req = request(Some(pet.id.to_string()), None);
        req.email = "not an email".to_owned();

        let outcome = h.workflow().run(&req).await;

        assert!(matches!(
            outcome,
            PurchaseOutcome::Completed { notified: false, .. }
        ));
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_path_id_falls_back_to_body() {
        let h = Harness::new();
        let pet = h.rex().await;

        let outcome = h
            .workflow()
            .run(&request(Some("null".to_owned()), Some(pet.id.to_string())))
            .await;

        assert_eq!(outcome.state(), PurchaseState::Completed);
        assert_eq!(outcome.pet_id(), Some(pet.id));
    }

    #[tokio::test]
    async fn test_both_ids_absent_fails_lookup() {
        let h = Harness::new();
        h.rex().await;

        let outcome = h.workflow().run(&request(None, None)).await;

        assert_eq!(outcome.state(), PurchaseState::LookupFailed);
        assert!(h.payments.charges().is_empty());
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_pet_fails_lookup() {
        let h = Harness::new();

        let outcome = h
            .workflow()
            .run(&request(Some(PetId::generate().to_string()), None))
            .await;

        assert!(matches!(outcome, PurchaseOutcome::LookupFailed { ref reason } if reason.contains("not found")));
        assert!(h.payments.charges().is_empty());
    }

    #[test]
    fn test_path_id_wins_over_body() {
        let path = PetId::generate();
        let body = PetId::generate();
        let req = request(Some(path.to_string()), Some(body.to_string()));
        assert_eq!(req.resolve_pet_id(), Some(path));
    }
}
