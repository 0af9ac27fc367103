pub mod token;

use chrono::Utc;
use futures::future::{ BoxFuture, FutureExt, Shared };
use log::{ debug, info, warn };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use thiserror::Error;

use crate::models::auth::{ RefreshRequest, RefreshResponse, TokenPair };
use crate::storage::{ KeyValueStore, StorageError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY };

#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingRefreshToken,
    #[error("refresh rejected with status {0}")]
    Rejected(u16),
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("credential storage failed: {0}")]
    Storage(String),
}

impl From<StorageError> for RefreshError {
    fn from(err: StorageError) -> Self {
        RefreshError::Storage(err.to_string())
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Owns the stored credential pair. All reads and writes of the tokens go
/// through here, and at most one refresh call is in flight at any time.
pub struct Session {
    store: Arc<dyn KeyValueStore>,
    http: reqwest::Client,
    refresh_url: String,
    in_flight: Mutex<Option<RefreshFuture>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(store: Arc<dyn KeyValueStore>, http: reqwest::Client, refresh_url: String) -> Self {
        Self {
            store,
            http,
            refresh_url,
            in_flight: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub async fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get(ACCESS_TOKEN_KEY).await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.store.get(REFRESH_TOKEN_KEY).await
    }

    pub async fn store_tokens(&self, pair: &TokenPair) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, &pair.access).await?;
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh).await
    }

    pub async fn store_access_token(&self, access: &str) -> Result<(), StorageError> {
        self.store.set(ACCESS_TOKEN_KEY, access).await
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(ACCESS_TOKEN_KEY).await?;
        self.store.remove(REFRESH_TOKEN_KEY).await
    }

    /// Whether a stored access token exists and has not expired yet.
    pub async fn is_authenticated(&self) -> bool {
        match self.access_token().await {
            Ok(Some(token)) => token::is_fresh(&token, Utc::now()),
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read access token: {}", e);
                false
            }
        }
    }

    /// Returns an access token newer than `stale`. Callers that lose the race
    /// either pick up the token another caller already stored or await the
    /// refresh that is still running.
    pub async fn refresh(&self, stale: Option<&str>) -> Result<String, RefreshError> {
        if let Some(current) = self.access_token().await? {
            if stale != Some(current.as_str()) {
                debug!("Access token was already refreshed by another request");
                return Ok(current);
            }
        }

        let refresh = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(running) if running.peek().is_none() => running.clone(),
                _ => {
                    let started = self.start_refresh().shared();
                    *slot = Some(started.clone());
                    started
                }
            }
        };

        let result = refresh.await;

        let mut slot = lock(&self.in_flight);
        if slot.as_ref().map_or(false, |finished| finished.peek().is_some()) {
            *slot = None;
        }
        result
    }

    fn start_refresh(&self) -> BoxFuture<'static, Result<String, RefreshError>> {
        let store = self.store.clone();
        let http = self.http.clone();
        let url = self.refresh_url.clone();

        (async move {
            let refresh = store
                .get(REFRESH_TOKEN_KEY).await?
                .ok_or(RefreshError::MissingRefreshToken)?;

            info!("Refreshing access token");
            let resp = http
                .post(&url)
                .json(&(RefreshRequest { refresh: &refresh }))
                .send().await
                .map_err(|e| RefreshError::Transport(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(RefreshError::Rejected(status.as_u16()));
            }

            let body = resp
                .json::<RefreshResponse>().await
                .map_err(|e| RefreshError::Transport(e.to_string()))?;
            store.set(ACCESS_TOKEN_KEY, &body.access).await?;
            Ok(body.access)
        }).boxed()
    }
}
