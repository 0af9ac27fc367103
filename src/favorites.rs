use log::info;
use std::sync::Arc;

use crate::models::pet::Pet;
use crate::storage::{ KeyValueStore, StorageError, FAVORITES_KEY };

/// Client-side favorites: full pet objects kept under the `favorites` key.
pub struct Favorites {
    store: Arc<dyn KeyValueStore>,
}

impl Favorites {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Pet>, StorageError> {
        match self.store.get(FAVORITES_KEY).await? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn is_favorite(&self, pet_id: u64) -> Result<bool, StorageError> {
        Ok(self.list().await?.iter().any(|p| p.id == pet_id))
    }

    /// Adds the pet, or removes it when already present. Returns whether it is
    /// a favorite afterwards.
    pub async fn toggle(&self, pet: &Pet) -> Result<bool, StorageError> {
        let mut favorites = self.list().await?;
        let before = favorites.len();
        favorites.retain(|p| p.id != pet.id);
        let added = favorites.len() == before;
        if added {
            favorites.push(pet.clone());
        }
        self.store.set(FAVORITES_KEY, &serde_json::to_string(&favorites)?).await?;
        info!("Pet {} {} favorites", pet.id, if added { "added to" } else { "removed from" });
        Ok(added)
    }
}
