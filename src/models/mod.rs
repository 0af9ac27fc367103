pub mod auth;
pub mod chat;
pub mod forum;
pub mod pet;
pub mod profile;
pub mod websocket;

use serde::Deserialize;

/// List endpoints answer with either a bare array or a paginated envelope.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Listing<T> {
    Items(Vec<T>),
    Page {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        #[serde(default)]
        previous: Option<String>,
        results: Vec<T>,
    },
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Items(items) => items,
            Listing::Page { results, .. } => results,
        }
    }
}
