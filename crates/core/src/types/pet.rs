//! The pet record and its create/update inputs.
//!
//! [`PetForm`] carries raw string fields exactly as a browser submits them.
//! It converts into the typed [`NewPet`] or [`PetUpdate`], collecting every
//! problem into one [`ValidationError`] rather than stopping at the first.

use core::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::id::PetId;
use super::price::Price;

/// Longest accepted pet name or species.
pub const MAX_NAME_LENGTH: usize = 100;

/// A pet listed for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: PetId,
    pub name: String,
    pub species: String,
    pub birthday: Option<NaiveDate>,
    pub favorite_food: Option<String>,
    pub description: Option<String>,
    pub price: Price,
    /// Canonical avatar URL without a version suffix.
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pet {
    /// URL of one derived avatar version, e.g. `avatar_version_url("-square")`.
    #[must_use]
    pub fn avatar_version_url(&self, suffix: &str) -> Option<String> {
        self.avatar_url
            .as_ref()
            .map(|base| format!("{base}{suffix}.jpg"))
    }
}

/// One invalid field and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Required fields were missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Build an error for a single field.
    #[must_use]
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field,
                message: message.into(),
            }],
        }
    }

    /// Whether the given field is among the failures.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "invalid pet ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Default)]
struct Collector(Vec<FieldError>);

impl Collector {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors: self.0 })
        }
    }

    fn check_label(&mut self, field: &'static str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "is required");
        } else if value.chars().count() > MAX_NAME_LENGTH {
            self.push(field, format!("must be at most {MAX_NAME_LENGTH} characters"));
        }
    }
}

/// Fields for a pet that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPet {
    pub name: String,
    pub species: String,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub favorite_food: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
}

impl NewPet {
    /// Check required text fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` listing every blank or oversized field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Collector::default();
        errors.check_label("name", &self.name);
        errors.check_label("species", &self.species);
        errors.finish()
    }
}

/// A partial change to an existing pet. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetUpdate {
    pub name: Option<String>,
    pub species: Option<String>,
    pub birthday: Option<NaiveDate>,
    /// An empty string clears the stored value.
    pub favorite_food: Option<String>,
    /// An empty string clears the stored value.
    pub description: Option<String>,
    pub price: Option<Price>,
}

impl PetUpdate {
    /// Check the fields that are being changed.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if a supplied name or species is blank or oversized.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Collector::default();
        if let Some(name) = &self.name {
            errors.check_label("name", name);
        }
        if let Some(species) = &self.species {
            errors.check_label("species", species);
        }
        errors.finish()
    }

    /// Whether this update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.species.is_none()
            && self.birthday.is_none()
            && self.favorite_food.is_none()
            && self.description.is_none()
            && self.price.is_none()
    }

    /// Merge the supplied fields into `pet`.
    pub fn apply_to(&self, pet: &mut Pet) {
        if let Some(name) = &self.name {
            pet.name = name.trim().to_owned();
        }
        if let Some(species) = &self.species {
            pet.species = species.trim().to_owned();
        }
        if let Some(birthday) = self.birthday {
            pet.birthday = Some(birthday);
        }
        if let Some(food) = &self.favorite_food {
            pet.favorite_food = non_blank(food);
        }
        if let Some(description) = &self.description {
            pet.description = non_blank(description);
        }
        if let Some(price) = self.price {
            pet.price = price;
        }
    }
}

/// Raw pet fields as submitted by an HTML form or multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetForm {
    pub name: Option<String>,
    pub species: Option<String>,
    pub birthday: Option<String>,
    pub favorite_food: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
}

impl PetForm {
    /// Set a field by its form name. Unknown names are ignored.
    pub fn set(&mut self, field: &str, value: String) {
        match field {
            "name" => self.name = Some(value),
            "species" => self.species = Some(value),
            "birthday" => self.birthday = Some(value),
            "favoriteFood" => self.favorite_food = Some(value),
            "description" => self.description = Some(value),
            "price" => self.price = Some(value),
            _ => {}
        }
    }

    /// Convert into a validated [`NewPet`].
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `name`, `species` or `price` is missing or
    /// malformed, or `birthday` is not a `YYYY-MM-DD` date.
    pub fn into_new_pet(self) -> Result<NewPet, ValidationError> {
        let mut errors = Collector::default();

        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        let species = self.species.as_deref().map(str::trim).unwrap_or_default();
        errors.check_label("name", name);
        errors.check_label("species", species);

        let price = match self.price.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("price", "is required");
                None
            }
            Some(raw) => Price::parse(raw)
                .map_err(|e| errors.push("price", e.to_string()))
                .ok(),
        };
        let birthday = parse_birthday(self.birthday.as_deref(), &mut errors);

        errors.finish()?;
        let price = price.ok_or_else(|| ValidationError::single("price", "is required"))?;

        Ok(NewPet {
            name: name.to_owned(),
            species: species.to_owned(),
            birthday,
            favorite_food: self.favorite_food.as_deref().and_then(non_blank),
            description: self.description.as_deref().and_then(non_blank),
            price,
        })
    }

    /// Convert into a [`PetUpdate`]. Fields absent from the form stay unchanged.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if a supplied required field is blank or a
    /// supplied price/birthday cannot be parsed.
    pub fn into_update(self) -> Result<PetUpdate, ValidationError> {
        let mut errors = Collector::default();

        let price = match self.price.as_deref().map(str::trim) {
            None => None,
            Some("") => {
                errors.push("price", "is required");
                None
            }
            Some(raw) => Price::parse(raw)
                .map_err(|e| errors.push("price", e.to_string()))
                .ok(),
        };
        let birthday = parse_birthday(self.birthday.as_deref(), &mut errors);

        let update = PetUpdate {
            name: self.name,
            species: self.species,
            birthday,
            favorite_food: self.favorite_food,
            description: self.description,
            price,
        };
        if let Err(invalid) = update.validate() {
            errors.0.extend(invalid.errors);
        }
        errors.finish()?;
        Ok(update)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn parse_birthday(raw: Option<&str>, errors: &mut Collector) -> Option<NaiveDate> {
    match raw.map(str::trim) {
        None | Some("") => None,
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| errors.push("birthday", "must be a date like 2020-01-31"))
            .ok(),
    }
}
