use serde::{ Serialize, Deserialize };

#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Credential pair issued by `POST /token/`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Serialize, Debug)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RegisteredUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct PasswordResetRequest<'a> {
    pub email: &'a str,
}
