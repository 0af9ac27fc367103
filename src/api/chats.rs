use super::client::ApiClient;
use super::error::ApiError;
use crate::models::chat::{ Chat, Message, SendMessageRequest, StartChatRequest };
use crate::models::Listing;

impl ApiClient {
    pub async fn list_chats(&self) -> Result<Vec<Chat>, ApiError> {
        let listing: Listing<Chat> = self.get("/chats/").await?;
        Ok(listing.into_items())
    }

    pub async fn get_chat(&self, chat_id: u64) -> Result<Chat, ApiError> {
        self.get(&format!("/chats/{}/", chat_id)).await
    }

    /// Full history, oldest first.
    pub async fn chat_messages(&self, chat_id: u64) -> Result<Vec<Message>, ApiError> {
        let listing: Listing<Message> = self.get(&format!("/chats/{}/messages/", chat_id)).await?;
        Ok(listing.into_items())
    }

    pub async fn send_message(&self, chat_id: u64, text: &str) -> Result<Message, ApiError> {
        self.post(&format!("/chats/{}/send/", chat_id), &(SendMessageRequest { text })).await
    }

    /// Gets or creates the conversation with `receiver_id`.
    pub async fn start_chat(&self, receiver_id: u64) -> Result<Chat, ApiError> {
        self.post("/chats/", &(StartChatRequest { receiver_id })).await
    }
}
