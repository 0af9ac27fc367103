use log::{ debug, error, warn };
use reqwest::header::{ HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE };
use reqwest::{ Client as HttpClient, Method, StatusCode };
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use super::error::ApiError;
use crate::auth::Session;
use crate::config::ClientConfig;
use crate::notify::{ Notifier, LOGIN_ROUTE };
use crate::storage::KeyValueStore;

pub const REFRESH_PATH: &str = "/token/refresh/";

/// Per-call knobs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    /// Set for the token endpoints themselves: a 401 there is final.
    pub skip_auth_refresh: bool,
}

impl RequestOptions {
    pub fn with_query(query: Vec<(String, String)>) -> Self {
        Self { query, ..Default::default() }
    }

    pub fn without_refresh() -> Self {
        Self { skip_auth_refresh: true, ..Default::default() }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// `Value::Null` for empty bodies.
    pub body: Value,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

struct PendingRequest {
    method: Method,
    url: Url,
    body: Option<Value>,
    skip_auth_refresh: bool,
    /// Set once the request has been replayed after a refresh.
    retried: bool,
}

/// Single entry point for backend calls: attaches the bearer token, refreshes
/// it once on 401 and turns failures into notices.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    session: Arc<Session>,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let base_url = config.api_base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e|
            ApiError::InvalidRequest(format!("invalid API base URL '{}': {}", base_url, e))
        )?;

        let refresh_url = format!("{}{}", base_url, REFRESH_PATH);
        let session = Arc::new(Session::new(store, http.clone(), refresh_url));

        Ok(Self { http, base_url, session, notifier })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Performs one API call. Every failure raises its notices exactly once
    /// before it is returned.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions
    ) -> Result<ApiResponse, ApiError> {
        self.execute(method, path, body, options).await.map_err(|e| self.report(e))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_with_query(path, Vec::new()).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>
    ) -> Result<T, ApiError> {
        let resp = self.request(Method::GET, path, None, RequestOptions::with_query(query)).await?;
        self.decode(resp)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
        where B: Serialize + ?Sized, T: DeserializeOwned
    {
        let body = to_body(body)?;
        let resp = self.request(Method::POST, path, Some(body), RequestOptions::default()).await?;
        self.decode(resp)
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
        where B: Serialize + ?Sized, T: DeserializeOwned
    {
        let body = to_body(body)?;
        let resp = self.request(Method::PUT, path, Some(body), RequestOptions::default()).await?;
        self.decode(resp)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.request(Method::DELETE, path, None, RequestOptions::default()).await?;
        Ok(())
    }

    /// Clears stored credentials and sends the user to the login entry point.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session.clear().await?;
        self.notifier.navigate(LOGIN_ROUTE);
        Ok(())
    }

    pub(super) fn decode<T: DeserializeOwned>(&self, resp: ApiResponse) -> Result<T, ApiError> {
        resp.json().map_err(|e| {
            error!("Failed to decode response: {}", e);
            self.report(e)
        })
    }

    pub(super) fn report(&self, err: ApiError) -> ApiError {
        debug!("API call failed: {}", err);
        for notice in err.notices() {
            self.notifier.notify(notice);
        }
        err
    }

    /// Runs the request without raising notices.
    pub(super) async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions
    ) -> Result<ApiResponse, ApiError> {
        let mut pending = PendingRequest {
            url: self.endpoint(path, &options.query)?,
            method,
            body,
            skip_auth_refresh: options.skip_auth_refresh,
            retried: false,
        };

        loop {
            let token = self.session.access_token().await?;
            let resp = self.dispatch(&pending, token.as_deref()).await?;

            if
                resp.status() == StatusCode::UNAUTHORIZED &&
                !pending.retried &&
                !pending.skip_auth_refresh
            {
                pending.retried = true;
                match self.session.refresh(token.as_deref()).await {
                    Ok(_) => {
                        debug!("Replaying {} {} with a refreshed token", pending.method, pending.url.path());
                        continue;
                    }
                    Err(e) => {
                        warn!("Token refresh failed, logging out: {}", e);
                        let detail = read_response(resp).await.err().and_then(|err| match err {
                            ApiError::Unauthorized { detail } => detail,
                            _ => None,
                        });
                        if let Err(e) = self.logout().await {
                            error!("Failed to clear credentials: {}", e);
                        }
                        return Err(ApiError::AuthExpired { detail });
                    }
                }
            }

            return read_response(resp).await;
        }
    }

    async fn dispatch(
        &self,
        pending: &PendingRequest,
        token: Option<&str>
    ) -> Result<reqwest::Response, ApiError> {
        let mut req = self.http.request(pending.method.clone(), pending.url.clone());
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &pending.body {
            req = req.json(body);
        }
        req.send().await.map_err(ApiError::from_transport)
    }

    fn endpoint(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e|
            ApiError::InvalidRequest(format!("invalid path '{}': {}", path, e))
        )?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }
}

async fn read_response(resp: reqwest::Response) -> Result<ApiResponse, ApiError> {
    let status = resp.status();
    let bytes = resp.bytes().await.map_err(ApiError::from_transport)?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json
            ::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    if status.is_success() {
        Ok(ApiResponse { status, body })
    } else {
        Err(ApiError::from_response(status, &body))
    }
}

pub(super) fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}
