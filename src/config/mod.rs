use serde::{ Deserialize, Serialize };
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cli::Args;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_WS_BASE_URL: &str = "ws://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Memory,
    File,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseStorageTypeError {
    message: String,
}

impl fmt::Display for ParseStorageTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseStorageTypeError {}

impl FromStr for StorageType {
    type Err = ParseStorageTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageType::Memory),
            "file" => Ok(StorageType::File),
            _ =>
                Err(ParseStorageTypeError {
                    message: format!("Invalid storage type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base, including the `/api` prefix every path is appended to.
    pub api_base_url: String,
    /// Origin of the chat socket endpoint (`ws://` or `wss://`).
    pub ws_base_url: String,
    pub timeout: Duration,
    pub storage_type: StorageType,
    pub storage_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_base_url: DEFAULT_WS_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            storage_type: StorageType::Memory,
            storage_path: PathBuf::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>, ws_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ws_base_url: ws_base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_args(args: &Args) -> Result<Self, ParseStorageTypeError> {
        Ok(Self {
            api_base_url: args.api_base_url.clone(),
            ws_base_url: args.ws_base_url.clone(),
            timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
            storage_type: args.storage_type.parse()?,
            storage_path: PathBuf::from(&args.storage_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_type_parses_case_insensitively() {
        assert_eq!("FILE".parse::<StorageType>(), Ok(StorageType::File));
        assert_eq!("memory".parse::<StorageType>(), Ok(StorageType::Memory));
        assert!("redis".parse::<StorageType>().is_err());
    }
}
