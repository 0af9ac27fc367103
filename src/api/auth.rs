use log::{ error, info, warn };
use reqwest::Method;

use super::client::{ to_body, ApiClient, RequestOptions };
use super::error::ApiError;
use crate::models::auth::{
    LoginRequest,
    PasswordResetRequest,
    RegisterRequest,
    RegisteredUser,
    TokenPair,
};
use crate::notify::{ Notice, HOME_ROUTE, LOGIN_ROUTE };

impl ApiClient {
    /// Exchanges credentials for a token pair. On success both tokens are
    /// stored and the user is sent home; on failure nothing is stored.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        let body = to_body(&(LoginRequest { username, password }))?;
        let result = self.request(
            Method::POST,
            "/token/",
            Some(body),
            RequestOptions::without_refresh()
        ).await;

        let pair: TokenPair = match result.and_then(|resp| self.decode(resp)) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Login failed for '{}': {}", username, e);
                self.session().clear().await?;
                return Err(e);
            }
        };

        self.session().store_tokens(&pair).await?;
        info!("Logged in as '{}'", username);
        self.notifier().notify(Notice::success("Logged in successfully."));
        self.notifier().navigate(HOME_ROUTE);
        Ok(pair)
    }

    pub async fn register(&self, form: &RegisterRequest) -> Result<RegisteredUser, ApiError> {
        let body = to_body(form)?;
        let resp = self.request(
            Method::POST,
            "/register/",
            Some(body),
            RequestOptions::without_refresh()
        ).await?;
        let user: RegisteredUser = self.decode(resp)?;
        info!("Registered account '{}'", user.username);
        self.notifier().notify(Notice::success("Registration complete. You can now log in."));
        self.notifier().navigate(LOGIN_ROUTE);
        Ok(user)
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let body = to_body(&(PasswordResetRequest { email }))?;
        self.request(
            Method::POST,
            "/password_reset/",
            Some(body),
            RequestOptions::without_refresh()
        ).await?;
        self.notifier().notify(Notice::info("Password reset instructions were sent to your email."));
        Ok(())
    }

    /// Makes sure a usable access token is stored before a screen loads its
    /// data. An expired token is refreshed; when that is impossible the
    /// credentials are cleared once and a single session-expired notice is raised.
    pub async fn ensure_session(&self) -> Result<(), ApiError> {
        if self.session().is_authenticated().await {
            return Ok(());
        }
        let stale = self.session()
            .access_token().await
            .map_err(|e| self.report(e.into()))?;
        match self.session().refresh(stale.as_deref()).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("No usable session: {}", e);
                if let Err(e) = self.logout().await {
                    error!("Failed to clear credentials: {}", e);
                }
                Err(self.report(ApiError::AuthExpired { detail: None }))
            }
        }
    }
}
