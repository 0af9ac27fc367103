use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::notify::Notice;
use crate::storage::StorageError;

pub const SERVER_ERROR_NOTICE: &str = "Server error. Please try again later.";
pub const TIMEOUT_NOTICE: &str = "Connection timed out. Check your internet connection.";
pub const CONNECTIVITY_NOTICE: &str = "Network error. Check your internet connection.";
pub const SESSION_EXPIRED_NOTICE: &str = "Your session has expired. Please log in again.";

/// Field name to the messages the server attached to it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials were rejected and could not be refreshed; the session was cleared.
    #[error("session expired")]
    AuthExpired {
        detail: Option<String>,
    },
    /// Credentials were rejected even after a refresh, or on an endpoint that never refreshes.
    #[error("unauthorized")]
    Unauthorized {
        detail: Option<String>,
    },
    #[error("validation failed with status {status}")]
    Validation {
        status: u16,
        fields: FieldErrors,
    },
    #[error("resource not found")]
    NotFound {
        detail: Option<String>,
    },
    #[error("server error (status {status})")]
    Server {
        status: u16,
    },
    #[error("request rejected (status {status})")]
    Rejected {
        status: u16,
        detail: Option<String>,
    },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Connectivity(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Normalizes a non-success response.
    pub fn from_response(status: StatusCode, body: &Value) -> Self {
        if status.is_server_error() {
            return ApiError::Server { status: status.as_u16() };
        }
        let detail = body
            .get("detail")
            .and_then(|d| d.as_str())
            .map(str::to_string);

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { detail },
            StatusCode::NOT_FOUND => ApiError::NotFound { detail },
            _ => {
                if detail.is_none() {
                    if let Some(fields) = field_errors(body) {
                        return ApiError::Validation { status: status.as_u16(), fields };
                    }
                }
                ApiError::Rejected { status: status.as_u16(), detail }
            }
        }
    }

    /// Normalizes a failure where no usable response arrived.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Connectivity(err.to_string())
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::Connectivity(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthExpired { .. } | ApiError::Unauthorized { .. } => Some(401),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Validation { status, .. } |
            ApiError::Server { status } |
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The notices a single failed call raises.
    pub fn notices(&self) -> Vec<Notice> {
        match self {
            ApiError::Server { .. } => vec![Notice::error(SERVER_ERROR_NOTICE)],
            ApiError::Validation { fields, .. } =>
                fields
                    .values()
                    .flatten()
                    .map(|msg| Notice::error(msg.clone()))
                    .collect(),
            ApiError::AuthExpired { .. } => vec![Notice::error(SESSION_EXPIRED_NOTICE)],
            ApiError::Unauthorized { detail } =>
                vec![Notice::error(detail.clone().unwrap_or_else(|| "Authorization required.".to_string()))],
            ApiError::NotFound { detail } =>
                vec![
                    Notice::error(
                        detail.clone().unwrap_or_else(|| "The requested item was not found.".to_string())
                    )
                ],
            ApiError::Rejected { status, detail } =>
                vec![
                    Notice::error(
                        detail.clone().unwrap_or_else(|| format!("Request failed with status {}.", status))
                    )
                ],
            ApiError::Timeout => vec![Notice::error(TIMEOUT_NOTICE)],
            ApiError::Connectivity(_) => vec![Notice::error(CONNECTIVITY_NOTICE)],
            ApiError::Decode(_) => vec![Notice::error("Unexpected response from the server.")],
            ApiError::InvalidRequest(msg) => vec![Notice::error(format!("Invalid request: {}", msg))],
            ApiError::Storage(e) => vec![Notice::error(format!("Could not access local storage: {}", e))],
        }
    }
}

/// Flattens a `{field: [msg, ...]}` body. String values and nested arrays are
/// accepted; returns `None` when the body carries no messages at all.
pub fn field_errors(body: &Value) -> Option<FieldErrors> {
    let object = body.as_object()?;
    let mut fields = FieldErrors::new();
    for (field, value) in object {
        let mut messages = Vec::new();
        collect_messages(value, &mut messages);
        if !messages.is_empty() {
            fields.insert(field.clone(), messages);
        }
    }
    if fields.is_empty() { None } else { Some(fields) }
}

fn collect_messages(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                collect_messages(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_errors_win_over_body_content() {
        let err = ApiError::from_response(
            StatusCode::BAD_GATEWAY,
            &json!({ "detail": "upstream exploded" })
        );
        assert!(matches!(err, ApiError::Server { status: 502 }));
        assert_eq!(err.notices(), vec![Notice::error(SERVER_ERROR_NOTICE)]);
    }

    #[test]
    fn detail_is_shown_verbatim() {
        let err = ApiError::from_response(
            StatusCode::FORBIDDEN,
            &json!({ "detail": "You do not have permission to perform this action." })
        );
        assert_eq!(err.notices(), vec![
            Notice::error("You do not have permission to perform this action.")
        ]);
    }

    #[test]
    fn one_notice_per_field_message() {
        let body =
            json!({
            "username": ["A user with that username already exists."],
            "password": ["This password is too short.", "This password is too common."],
            "non_field_errors": "Passwords do not match",
            "age": 3
        });
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, &body);
        match &err {
            ApiError::Validation { status, fields } => {
                assert_eq!(*status, 400);
                assert_eq!(fields.len(), 3);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(err.notices().len(), 4);
    }

    #[test]
    fn detail_takes_precedence_over_fields() {
        let body = json!({ "detail": "Bad request", "name": ["required"] });
        let err = ApiError::from_response(StatusCode::BAD_REQUEST, &body);
        assert!(matches!(err, ApiError::Rejected { status: 400, .. }));
        assert_eq!(err.notices(), vec![Notice::error("Bad request")]);
    }

    #[test]
    fn not_found_and_plain_bodies_still_raise_one_notice() {
        let err = ApiError::from_response(StatusCode::NOT_FOUND, &json!({ "detail": "Not found." }));
        assert!(matches!(err, ApiError::NotFound { .. }));
        assert_eq!(err.notices().len(), 1);

        let err = ApiError::from_response(StatusCode::CONFLICT, &Value::String("<html>".into()));
        assert_eq!(err.notices(), vec![Notice::error("Request failed with status 409.")]);
    }

    #[test]
    fn network_errors_have_distinct_notices() {
        assert_eq!(ApiError::Timeout.notices(), vec![Notice::error(TIMEOUT_NOTICE)]);
        assert_eq!(ApiError::Connectivity("refused".into()).notices(), vec![
            Notice::error(CONNECTIVITY_NOTICE)
        ]);
        assert!(ApiError::Timeout.is_network());
    }
}
