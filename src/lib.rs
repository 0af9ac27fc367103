pub mod api;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod favorites;
pub mod models;
pub mod notify;
pub mod storage;

use cli::commands::{ execute, App };
use cli::Args;
use config::ClientConfig;
use favorites::Favorites;
use log::debug;
use notify::LogNotifier;
use std::error::Error;
use std::sync::Arc;

pub use api::{ ApiClient, ApiError };
pub use chat::{ ChatSession, ConnectionState, SendOutcome };

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ClientConfig::from_args(&args)?;

    debug!("--- Client Configuration ---");
    debug!("API Base URL: {}", config.api_base_url);
    debug!("WebSocket Base URL: {}", config.ws_base_url);
    debug!("Request Timeout: {:?}", config.timeout);
    debug!("Storage Type: {:?}", config.storage_type);
    debug!("Storage Path: {}", config.storage_path.display());
    debug!("----------------------------");

    let store = storage::create_store(&config.storage_type, &config.storage_path);
    let api = ApiClient::new(&config, store.clone(), Arc::new(LogNotifier))?;
    let app = App {
        api,
        favorites: Favorites::new(store),
        ws_base_url: config.ws_base_url.clone(),
    };

    execute(&app, args.command).await
}
