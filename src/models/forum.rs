use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

use super::chat::UserSummary;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForumCategory {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Topic {
    pub id: u64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: Option<UserSummary>,
    #[serde(default)]
    pub category: Option<ForumCategory>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub author: Option<UserSummary>,
    pub text: String,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, Clone)]
pub struct NewTopic {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
}

#[derive(Serialize, Debug)]
pub struct NewComment<'a> {
    pub text: &'a str,
}
