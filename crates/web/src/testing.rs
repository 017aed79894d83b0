//! In-memory doubles for the injected services.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{Duration, Utc};
use image::{DynamicImage, ImageFormat};
use petes_pets_core::{CurrencyCode, Email, NewPet, Pet, PetId, PetUpdate, Price};

use crate::db::{PetStore, RepositoryError};
use crate::services::avatar::{AvatarUploader, UploadError};
use crate::services::email::{Mailer, Notification, SendError};
use crate::services::payments::{ChargeRequest, Confirmation, PaymentError, PaymentProcessor};
use crate::services::storage::ObjectStorage;
use crate::state::{AppState, CheckoutSettings};

/// Application state wired to in-memory doubles, with handles to inspect them.
pub struct TestApp {
    pub state: AppState,
    pub pets: Arc<MemoryPetStore>,
    pub payments: Arc<ScriptedPayments>,
    pub mailer: Arc<RecordingMailer>,
    pub storage: Arc<MemoryStorage>,
    /// Scratch directory for multipart uploads, private to this app.
    pub upload_dir: PathBuf,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::with_storage(MemoryStorage::default())
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(storage: MemoryStorage) -> Self {
        let pets = Arc::new(MemoryPetStore::default());
        let payments = Arc::new(ScriptedPayments::default());
        let mailer = Arc::new(RecordingMailer::default());
        let storage = Arc::new(storage);
        let upload_dir = std::env::temp_dir().join(format!("pets-uploads-{}", PetId::generate()));
        std::fs::create_dir_all(&upload_dir).unwrap();

        let state = AppState::new(
            pets.clone(),
            AvatarUploader::new(storage.clone(), "pets/avatar"),
            payments.clone(),
            mailer.clone(),
            CheckoutSettings {
                publishable_key: "pk_test_TYooMQauvdEDq54NiTphI7jx".to_owned(),
                currency: CurrencyCode::Usd,
            },
            upload_dir.clone(),
        );

        Self {
            state,
            pets,
            payments,
            mailer,
            storage,
            upload_dir,
        }
    }

    /// Files still sitting in the upload directory.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.upload_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    /// The full router over this state.
    pub fn router(&self) -> Router {
        crate::routes::app(self.state.clone(), &std::env::temp_dir())
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

/// A solid-color PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// A PNG written to a unique scratch path.
pub fn png_file() -> PathBuf {
    let path = std::env::temp_dir().join(format!("pets-test-{}", PetId::generate()));
    std::fs::write(&path, png_bytes(320, 240)).unwrap();
    path
}

/// A valid `NewPet` with the given required fields.
pub fn new_pet(name: &str, species: &str, price: &str) -> NewPet {
    NewPet {
        name: name.to_owned(),
        species: species.to_owned(),
        birthday: None,
        favorite_food: None,
        description: None,
        price: Price::parse(price).unwrap(),
    }
}

/// `PetStore` over a vector, with crude weighted term matching for search.
#[derive(Default)]
pub struct MemoryPetStore {
    pets: Mutex<Vec<Pet>>,
    fail: AtomicBool,
}

impl MemoryPetStore {
    /// Make every subsequent call fail with a database error.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.pets.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

fn score(pet: &Pet, term: &str) -> u32 {
    term.split_whitespace()
        .map(str::to_lowercase)
        .map(|word| {
            let hit = |text: &str| u32::from(text.to_lowercase().contains(&word));
            hit(&pet.name) * 4
                + hit(&pet.species) * 2
                + pet.description.as_deref().map_or(0, hit)
                + pet.favorite_food.as_deref().map_or(0, hit)
        })
        .sum()
}

#[async_trait]
impl PetStore for MemoryPetStore {
    async fn create(&self, pet: NewPet) -> Result<Pet, RepositoryError> {
        self.check()?;
        pet.validate()?;
        let mut pets = self.pets.lock().unwrap();
        // Strictly increasing timestamps keep "newest first" deterministic
        let now = Utc::now() + Duration::seconds(i64::try_from(pets.len()).unwrap());
        let created = Pet {
            id: PetId::generate(),
            name: pet.name.trim().to_owned(),
            species: pet.species.trim().to_owned(),
            birthday: pet.birthday,
            favorite_food: pet.favorite_food,
            description: pet.description,
            price: pet.price,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        pets.push(created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: PetId) -> Result<Pet, RepositoryError> {
        self.check()?;
        self.pets
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update(&self, id: PetId, update: PetUpdate) -> Result<Pet, RepositoryError> {
        self.check()?;
        update.validate()?;
        let mut pets = self.pets.lock().unwrap();
        let pet = pets
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        update.apply_to(pet);
        pet.updated_at = Utc::now();
        Ok(pet.clone())
    }

    async fn set_avatar_url(&self, id: PetId, url: &str) -> Result<Pet, RepositoryError> {
        self.check()?;
        let mut pets = self.pets.lock().unwrap();
        let pet = pets
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        pet.avatar_url = Some(url.to_owned());
        Ok(pet.clone())
    }

    async fn delete(&self, id: PetId) -> Result<(), RepositoryError> {
        self.check()?;
        let mut pets = self.pets.lock().unwrap();
        let before = pets.len();
        pets.retain(|p| p.id != id);
        if pets.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn search(&self, term: &str, limit: u32) -> Result<Vec<Pet>, RepositoryError> {
        self.check()?;
        let pets = self.pets.lock().unwrap();
        let mut scored: Vec<(u32, &Pet)> = pets
            .iter()
            .map(|p| (score(p, term), p))
            .filter(|(s, _)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.created_at.cmp(&a.1.created_at)));
        Ok(scored
            .into_iter()
            .take(limit as usize)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Pet>, RepositoryError> {
        self.check()?;
        let mut pets = self.pets.lock().unwrap().clone();
        pets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pets
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        self.check()?;
        Ok(self.len() as u64)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check()
    }
}

type ErrorFactory = Box<dyn Fn() -> PaymentError + Send + Sync>;

/// Records every charge and succeeds unless told to fail.
#[derive(Default)]
pub struct ScriptedPayments {
    charges: Mutex<Vec<ChargeRequest>>,
    succeeded: AtomicUsize,
    failure: Mutex<Option<ErrorFactory>>,
}

impl ScriptedPayments {
    pub fn fail_with(&self, error: impl Fn() -> PaymentError + Send + Sync + 'static) {
        *self.failure.lock().unwrap() = Some(Box::new(error));
    }

    /// Every attempted charge, in order.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }

    pub fn successful_charges(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedPayments {
    async fn charge(&self, request: &ChargeRequest) -> Result<Confirmation, PaymentError> {
        self.charges.lock().unwrap().push(request.clone());
        if let Some(error) = self.failure.lock().unwrap().as_ref() {
            return Err(error());
        }
        let n = self.succeeded.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Confirmation {
            id: format!("ch_test_{n}"),
            amount: request.amount_minor,
            currency: request.currency.as_str().to_owned(),
            status: "succeeded".to_owned(),
        })
    }
}

/// Keeps sent notifications instead of delivering them.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(Email, Notification)>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(Email, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &Email, notification: &Notification) -> Result<(), SendError> {
        // Rendering catches template errors even in tests
        notification.render()?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(SendError::Api {
                status: 503,
                message: "mail provider unavailable".to_owned(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.clone(), notification.clone()));
        Ok(())
    }
}

/// Object storage that keeps keys in memory.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<Vec<(String, usize)>>,
    fail: bool,
}

impl MemoryStorage {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, UploadError> {
        if self.fail {
            return Err(UploadError::Storage {
                status: 403,
                message: "AccessDenied".to_owned(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .push((key.to_owned(), body.len()));
        Ok(format!("https://storage.test/{key}"))
    }
}
