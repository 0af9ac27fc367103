use reqwest::Method;
use serde_json::Value;

use super::client::{ ApiClient, RequestOptions };
use super::error::ApiError;
use crate::models::forum::{ Comment, NewComment, NewTopic, Topic };
use crate::models::Listing;

impl ApiClient {
    pub async fn list_topics(&self) -> Result<Vec<Topic>, ApiError> {
        let listing: Listing<Topic> = self.get("/forum/").await?;
        Ok(listing.into_items())
    }

    pub async fn get_topic(&self, id: u64) -> Result<Topic, ApiError> {
        self.get(&format!("/forum/{}/", id)).await
    }

    pub async fn create_topic(&self, topic: &NewTopic) -> Result<Topic, ApiError> {
        self.post("/forum/", topic).await
    }

    /// Returns the server's like state as-is; its shape differs between deployments.
    pub async fn like_topic(&self, id: u64) -> Result<Value, ApiError> {
        let path = format!("/forum/{}/like/", id);
        let resp = self.request(Method::POST, &path, None, RequestOptions::default()).await?;
        Ok(resp.body)
    }

    pub async fn topic_comments(&self, id: u64) -> Result<Vec<Comment>, ApiError> {
        let listing: Listing<Comment> = self.get(&format!("/forum/{}/comments/", id)).await?;
        Ok(listing.into_items())
    }

    pub async fn add_comment(&self, id: u64, text: &str) -> Result<Comment, ApiError> {
        self.post(&format!("/forum/{}/add_comment/", id), &(NewComment { text })).await
    }
}
