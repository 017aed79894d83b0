//! Seed the database with pets from a YAML file.
//!
//! The file is a list of pets using the same field names as the JSON API:
//!
//! ```yaml
//! - name: Rex
//!   species: dog
//!   birthday: 2019-04-01
//!   favoriteFood: bacon
//!   price: "25.00"
//! ```

use std::path::Path;

use petes_pets_core::{NewPet, ValidationError};
use petes_pets_web::db::{self, PetStore, PgPetStore};
use tracing::{error, info, warn};

/// Pets parsed from a seed file, split by validity.
#[derive(Debug, Default)]
pub struct SeedPlan {
    pub valid: Vec<NewPet>,
    /// Position in the file (1-based) and the reason it was rejected
    pub invalid: Vec<(usize, ValidationError)>,
}

/// Parse and validate a seed file's contents.
///
/// # Errors
///
/// Returns `serde_yaml::Error` if the document is not a list of pets.
pub fn plan(content: &str) -> Result<SeedPlan, serde_yaml::Error> {
    let pets: Vec<NewPet> = serde_yaml::from_str(content)?;
    let mut plan = SeedPlan::default();

    for (index, pet) in pets.into_iter().enumerate() {
        match pet.validate() {
            Ok(()) => plan.valid.push(pet),
            Err(e) => plan.invalid.push((index + 1, e)),
        }
    }
    Ok(plan)
}

/// Insert every valid pet from `file_path`.
///
/// Invalid entries are reported and skipped unless `strict` is set, in which
/// case nothing is inserted.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the database is
/// unreachable, or `strict` is set and an entry is invalid.
pub async fn pets(file_path: &Path, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url()?;

    info!(path = %file_path.display(), "Loading pets from file");
    let content = tokio::fs::read_to_string(file_path).await?;
    let plan = plan(&content)?;

    for (position, err) in &plan.invalid {
        warn!("  - entry {position}: {err}");
    }
    if strict && !plan.invalid.is_empty() {
        return Err(format!("{} invalid entries found", plan.invalid.len()).into());
    }

    let pool = db::create_pool(&database_url).await?;
    let store = PgPetStore::new(pool);
    info!("Connected to database");

    let mut inserted = 0usize;
    let mut failed = 0usize;
    for pet in plan.valid {
        let name = pet.name.clone();
        match store.create(pet).await {
            Ok(created) => {
                info!(pet_id = %created.id, "  + {name}");
                inserted += 1;
            }
            Err(e) => {
                error!("  ! {name}: {e}");
                failed += 1;
            }
        }
    }

    info!("Seeding complete!");
    info!("  Pets inserted: {inserted}");
    info!("  Entries skipped (invalid): {}", plan.invalid.len());
    if failed > 0 {
        error!("  Inserts failed: {failed}");
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_splits_valid_and_invalid() {
        let content = r#"
- name: Rex
  species: dog
  birthday: 2019-04-01
  favoriteFood: bacon
  price: "25.00"
- name: "  "
  species: cat
  price: "10"
- name: Goldie
  species: fish
  price: "3.50"
"#;
        let plan = plan(content).unwrap();

        assert_eq!(plan.valid.len(), 2);
        assert_eq!(plan.valid[0].favorite_food.as_deref(), Some("bacon"));
        assert_eq!(plan.valid[1].price.to_string(), "3.50");
        assert_eq!(plan.invalid.len(), 1);
        assert_eq!(plan.invalid[0].0, 2);
        assert!(plan.invalid[0].1.has_field("name"));
    }

    #[test]
    fn test_plan_rejects_non_list() {
        assert!(plan("name: Rex").is_err());
    }

    #[test]
    fn test_plan_rejects_negative_price() {
        assert!(plan("- {name: Rex, species: dog, price: \"-1\"}").is_err());
    }

    #[test]
    fn test_bundled_seed_file_is_valid() {
        let plan = plan(include_str!("../../seeds/pets.yaml")).unwrap();
        assert!(!plan.valid.is_empty());
        assert!(plan.invalid.is_empty());
    }
}
