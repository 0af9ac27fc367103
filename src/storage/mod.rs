mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use log::info;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::StorageType;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const FAVORITES_KEY: &str = "favorites";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage data error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent string key-value storage shared by the credential and favorites layers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub fn create_store(storage_type: &StorageType, path: &Path) -> Arc<dyn KeyValueStore> {
    match storage_type {
        StorageType::Memory => {
            info!("Client state is kept in memory and discarded on exit");
            Arc::new(MemoryStore::new())
        }
        StorageType::File => {
            info!("Client state will be stored in: {}", path.display());
            Arc::new(FileStore::new(path))
        }
    }
}
