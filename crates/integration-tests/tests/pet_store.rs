//! Integration tests for `PgPetStore`.
//!
//! These tests require a migrated `PostgreSQL` database at `DATABASE_URL`.

use petes_pets_core::{NewPet, PetId, PetUpdate, Price};
use petes_pets_integration_tests::database_url;
use petes_pets_web::db::{PetStore, PgPetStore, RepositoryError, create_pool};

async fn store() -> PgPetStore {
    let pool = create_pool(&database_url())
        .await
        .expect("Failed to connect to database");
    PgPetStore::new(pool)
}

fn pet(name: &str, description: Option<&str>) -> NewPet {
    NewPet {
        name: name.to_owned(),
        species: "dog".to_owned(),
        birthday: None,
        favorite_food: None,
        description: description.map(str::to_owned),
        price: Price::parse("12.50").expect("valid price"),
    }
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_crud_round_trip() {
    let store = store().await;

    let created = store
        .create(pet("Store Rex", None))
        .await
        .expect("create");
    assert_eq!(created.price.to_string(), "12.50");

    let fetched = store.get_by_id(created.id).await.expect("get");
    assert_eq!(fetched, created);

    let update = PetUpdate {
        favorite_food: Some("kibble".to_owned()),
        ..PetUpdate::default()
    };
    let updated = store.update(created.id, update).await.expect("update");
    assert_eq!(updated.favorite_food.as_deref(), Some("kibble"));
    assert!(updated.updated_at >= created.updated_at);

    let with_avatar = store
        .set_avatar_url(created.id, "https://bucket.test/pets/avatar/abc")
        .await
        .expect("set avatar");
    assert_eq!(
        with_avatar.avatar_version_url("-square").as_deref(),
        Some("https://bucket.test/pets/avatar/abc-square.jpg")
    );

    store.delete(created.id).await.expect("delete");
    assert!(matches!(
        store.get_by_id(created.id).await,
        Err(RepositoryError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_missing_pet_is_not_found() {
    let store = store().await;
    let id = PetId::generate();

    assert!(matches!(
        store.get_by_id(id).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert!(matches!(
        store.update(id, PetUpdate::default()).await,
        Err(RepositoryError::NotFound(_))
    ));
    assert!(matches!(
        store.delete(id).await,
        Err(RepositoryError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_search_ranks_name_over_description() {
    let store = store().await;
    let by_description = store
        .create(pet("Quillon", Some("Friends with a porcupine named Xylo")))
        .await
        .expect("create");
    let by_name = store.create(pet("Xylo", None)).await.expect("create");

    let ids: Vec<PetId> = store
        .search("xylo", 10)
        .await
        .expect("search")
        .into_iter()
        .map(|p| p.id)
        .collect();

    let name_rank = ids.iter().position(|id| *id == by_name.id);
    let description_rank = ids.iter().position(|id| *id == by_description.id);
    assert!(name_rank.is_some() && description_rank.is_some());
    assert!(name_rank < description_rank);

    store.delete(by_description.id).await.expect("cleanup");
    store.delete(by_name.id).await.expect("cleanup");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL"]
async fn test_ping() {
    store().await.ping().await.expect("ping");
}
