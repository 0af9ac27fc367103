use super::client::ApiClient;
use super::error::ApiError;
use crate::models::profile::{
    NewReview,
    Profile,
    ProfileStats,
    ProfileUpdate,
    Review,
    MAX_RATING,
    MIN_RATING,
};
use crate::models::Listing;
use crate::notify::Notice;

impl ApiClient {
    pub async fn get_profile(&self) -> Result<Profile, ApiError> {
        self.get("/profile/").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        self.put("/profile/", update).await
    }

    pub async fn profile_stats(&self) -> Result<ProfileStats, ApiError> {
        self.get("/profile/stats/").await
    }

    /// Public profile of another user, e.g. a seller.
    pub async fn get_user(&self, user_id: u64) -> Result<Profile, ApiError> {
        self.get(&format!("/users/{}/", user_id)).await
    }

    pub async fn seller_reviews(&self, user_id: u64) -> Result<Vec<Review>, ApiError> {
        let listing: Listing<Review> = self.get(&format!("/users/{}/reviews/", user_id)).await?;
        Ok(listing.into_items())
    }

    /// Ratings outside 1..=5 are refused before anything is sent.
    pub async fn add_review(&self, user_id: u64, rating: u8, text: &str) -> Result<Review, ApiError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(
                self.report(
                    ApiError::InvalidRequest(
                        format!("rating must be between {} and {}", MIN_RATING, MAX_RATING)
                    )
                )
            );
        }
        let review: Review = self.post(
            &format!("/users/{}/reviews/", user_id),
            &(NewReview { rating, text })
        ).await?;
        self.notifier().notify(Notice::success("Review added."));
        Ok(review)
    }
}
