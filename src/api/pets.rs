use log::debug;
use reqwest::Method;

use super::client::{ ApiClient, RequestOptions };
use super::error::ApiError;
use crate::models::pet::{ ActiveState, Category, Pet, PetFilter, PetForm };
use crate::notify::Notice;
use crate::models::Listing;

impl ApiClient {
    pub async fn list_pets(&self, filter: &PetFilter) -> Result<Vec<Pet>, ApiError> {
        let listing: Listing<Pet> = self.get_with_query("/pets/", filter.to_query()).await?;
        Ok(listing.into_items())
    }

    pub async fn get_pet(&self, id: u64) -> Result<Pet, ApiError> {
        self.get(&format!("/pets/{}/", id)).await
    }

    pub async fn my_pets(&self) -> Result<Vec<Pet>, ApiError> {
        let listing: Listing<Pet> = self.get("/pets/my_pets/").await?;
        Ok(listing.into_items())
    }

    pub async fn create_pet(&self, form: &PetForm) -> Result<Pet, ApiError> {
        self.post("/pets/", form).await
    }

    pub async fn update_pet(&self, id: u64, form: &PetForm) -> Result<Pet, ApiError> {
        self.put(&format!("/pets/{}/", id), form).await
    }

    pub async fn delete_pet(&self, id: u64) -> Result<(), ApiError> {
        self.delete(&format!("/pets/{}/", id)).await
    }

    /// Flips a listing between active and hidden. Only the owner may do this.
    pub async fn toggle_active(&self, id: u64) -> Result<ActiveState, ApiError> {
        let path = format!("/pets/{}/toggle_active/", id);
        let resp = self.request(Method::POST, &path, None, RequestOptions::default()).await?;
        let state: ActiveState = self.decode(resp)?;
        if !state.message.is_empty() {
            self.notifier().notify(Notice::success(state.message.clone()));
        }
        Ok(state)
    }

    /// Best effort; a failed counter bump is only logged.
    pub async fn increment_views(&self, id: u64) {
        let path = format!("/pets/{}/increment_views/", id);
        if let Err(e) = self.execute(Method::POST, &path, None, RequestOptions::default()).await {
            debug!("View counter for pet {} not updated: {}", id, e);
        }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let listing: Listing<Category> = self.get("/categories/").await?;
        Ok(listing.into_items())
    }
}
