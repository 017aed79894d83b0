//! Core types for Pete's Pets.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod pet;
pub mod price;

pub use email::{Email, EmailError};
pub use id::*;
pub use pet::{FieldError, NewPet, Pet, PetForm, PetUpdate, ValidationError};
pub use price::{CurrencyCode, PRICE_LIMIT, Price, PriceError};
