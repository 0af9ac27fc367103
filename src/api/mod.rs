pub mod auth;
pub mod chats;
pub mod client;
pub mod error;
pub mod forum;
pub mod pets;
pub mod profile;

pub use client::{ ApiClient, ApiResponse, RequestOptions };
pub use error::{ ApiError, FieldErrors };
pub use reqwest::Method;
