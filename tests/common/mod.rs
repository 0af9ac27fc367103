//! In-process stand-in for the storefront backend: token endpoints, a
//! protected profile route, listing/seller routes, chat REST routes and the
//! chat socket.
#![allow(dead_code)]

use axum::extract::ws::{ Message as WsMessage, WebSocket, WebSocketUpgrade };
use axum::extract::{ Path, Query, State };
use axum::http::{ HeaderMap, StatusCode };
use axum::response::{ IntoResponse, Response };
use axum::routing::{ get, post };
use axum::{ Json, Router };
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pet_market_client::config::ClientConfig;
use pet_market_client::notify::RecordingNotifier;
use pet_market_client::storage::{ KeyValueStore, MemoryStore };
use pet_market_client::ApiClient;
use serde_json::{ json, Value };
use std::collections::HashMap;
use std::sync::atomic::{ AtomicBool, AtomicU64, AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "secret";
pub const REFRESH_TOKEN: &str = "refresh-1";
pub const BAD_CREDENTIALS: &str = "No active account found with the given credentials";
pub const INVALID_TOKEN: &str = "Given token not valid for any token type";

pub fn jwt(subject: &str, expires_in_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + expires_in_secs;
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"token_type":"access","sub":"{}","exp":{}}}"#, subject, exp))
    )
}

pub struct Backend {
    valid_access: Mutex<String>,
    issued: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    /// Every protected route answers 401, even to fresh tokens.
    pub always_unauthorized: AtomicBool,
    pub reject_sockets: AtomicBool,
    /// Conversation detail answers 500.
    pub fail_chats: AtomicBool,
    pet_active: AtomicBool,
    reviews: Mutex<Vec<Value>>,
    next_message_id: AtomicU64,
    requests: Mutex<Vec<String>>,
    pushes: broadcast::Sender<String>,
}

impl Backend {
    fn new() -> Self {
        let (pushes, _) = broadcast::channel(16);
        Self {
            valid_access: Mutex::new(jwt("access-0", 3600)),
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            always_unauthorized: AtomicBool::new(false),
            reject_sockets: AtomicBool::new(false),
            fail_chats: AtomicBool::new(false),
            pet_active: AtomicBool::new(true),
            reviews: Mutex::new(Vec::new()),
            next_message_id: AtomicU64::new(100),
            requests: Mutex::new(Vec::new()),
            pushes,
        }
    }

    pub fn valid_access(&self) -> String {
        self.valid_access.lock().unwrap().clone()
    }

    fn rotate_access(&self) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = jwt(&format!("access-{}", n), 3600);
        *self.valid_access.lock().unwrap() = token.clone();
        token
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.requests.lock().unwrap().push(entry);
    }

    /// Sends a raw frame to every connected chat socket.
    pub fn push_frame(&self, frame: &str) {
        let _ = self.pushes.send(frame.to_string());
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.always_unauthorized.load(Ordering::SeqCst) {
            return false;
        }
        let expected = format!("Bearer {}", self.valid_access());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v == expected)
    }

    pub fn message(&self, id: u64, chat_id: u64, text: &str) -> Value {
        json!({
            "id": id,
            "chat": chat_id,
            "sender": { "id": 1, "username": USERNAME, "first_name": "", "last_name": "", "avatar": null },
            "text": text,
            "created_at": format!("2025-03-01T10:00:{:02}Z", id % 60),
            "is_read": false
        })
    }

    fn next_message(&self, chat_id: u64, text: &str) -> Value {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.message(id, chat_id, text)
    }
}

type Shared = Arc<Backend>;

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": INVALID_TOKEN, "code": "token_not_valid" }))).into_response()
}

async fn obtain_token(State(b): State<Shared>, Json(body): Json<Value>) -> Response {
    b.record("POST /api/token/".into());
    let username = body.get("username").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    if username == Some(USERNAME) && password == Some(PASSWORD) {
        let access = b.rotate_access();
        Json(json!({ "access": access, "refresh": REFRESH_TOKEN })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": BAD_CREDENTIALS }))).into_response()
    }
}

async fn refresh_token(State(b): State<Shared>, Json(body): Json<Value>) -> Response {
    b.refresh_calls.fetch_add(1, Ordering::SeqCst);
    b.record("POST /api/token/refresh/".into());
    tokio::time::sleep(Duration::from_millis(100)).await;
    if body.get("refresh").and_then(Value::as_str) == Some(REFRESH_TOKEN) {
        Json(json!({ "access": b.rotate_access() })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        ).into_response()
    }
}

async fn profile(State(b): State<Shared>, headers: HeaderMap) -> Response {
    b.record("GET /api/profile/".into());
    if !b.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "id": 1, "username": USERNAME, "email": "alice@example.com" })).into_response()
}

async fn register(State(b): State<Shared>) -> Response {
    b.record("POST /api/register/".into());
    (
        StatusCode::BAD_REQUEST,
        Json(
            json!({
            "username": ["A user with that username already exists."],
            "password": ["This password is too short.", "This password is too common."]
        })
        ),
    ).into_response()
}

async fn boom() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "<h1>Server Error (500)</h1>").into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({ "ok": true })).into_response()
}

async fn chat_detail(State(b): State<Shared>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    b.record(format!("GET /api/chats/{}/", id));
    if !b.authorized(&headers) {
        return unauthorized();
    }
    if b.fail_chats.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "<h1>Server Error (500)</h1>").into_response();
    }
    Json(
        json!({
        "id": id,
        "users": [
            { "id": 1, "username": USERNAME },
            { "id": 2, "username": "bob" }
        ],
        "last_message": null
    })
    ).into_response()
}

async fn chat_messages(State(b): State<Shared>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    b.record(format!("GET /api/chats/{}/messages/", id));
    if !b.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([b.message(1, id, "Is the puppy still available?"), b.message(2, id, "Yes, it is.")])).into_response()
}

async fn chat_send(
    State(b): State<Shared>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>
) -> Response {
    b.record(format!("POST /api/chats/{}/send/", id));
    if !b.authorized(&headers) {
        return unauthorized();
    }
    let text = body.get("text").and_then(Value::as_str).unwrap_or_default().trim().to_string();
    if text.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Text is required" }))).into_response();
    }
    (StatusCode::CREATED, Json(b.next_message(id, &text))).into_response()
}

async fn chat_socket(
    ws: WebSocketUpgrade,
    Path(id): Path<u64>,
    Query(query): Query<HashMap<String, String>>,
    State(b): State<Shared>
) -> Response {
    let token = query.get("token").cloned().unwrap_or_default();
    b.record(format!("WS /ws/chat/{}/ token={}", id, token));
    if b.reject_sockets.load(Ordering::SeqCst) || token != b.valid_access() {
        return StatusCode::FORBIDDEN.into_response();
    }
    let pushes = b.pushes.subscribe();
    ws.on_upgrade(move |socket| serve_chat(socket, id, b, pushes))
}

async fn serve_chat(
    mut socket: WebSocket,
    chat_id: u64,
    b: Shared,
    mut pushes: broadcast::Receiver<String>
) {
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        let frame: Value = serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                        let body = frame.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
                        let echo = json!({ "type": "message", "message": b.next_message(chat_id, &body) });
                        if socket.send(WsMessage::Text(echo.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            pushed = pushes.recv() => {
                match pushed {
                    Ok(frame) => {
                        if socket.send(WsMessage::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }
    b.record(format!("WS closed /ws/chat/{}/", chat_id));
}

async fn toggle_active(State(b): State<Shared>, Path(id): Path<u64>, headers: HeaderMap) -> Response {
    b.record(format!("POST /api/pets/{}/toggle_active/", id));
    if !b.authorized(&headers) {
        return unauthorized();
    }
    if id != 3 {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": "You cannot change the status of this listing" })),
        ).into_response();
    }
    let active = !b.pet_active.fetch_xor(true, Ordering::SeqCst);
    let message = if active { "Listing activated" } else { "Listing deactivated" };
    Json(json!({ "is_active": active, "message": message })).into_response()
}

async fn user_detail(State(b): State<Shared>, Path(id): Path<u64>) -> Response {
    b.record(format!("GET /api/users/{}/", id));
    if id != 2 {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response();
    }
    Json(
        json!({
        "id": 2,
        "username": "bob",
        "first_name": "Bob",
        "last_name": null,
        "location": "Kazan",
        "bio": "Breeder of corgis"
    })
    ).into_response()
}

async fn list_reviews(State(b): State<Shared>, Path(id): Path<u64>) -> Response {
    b.record(format!("GET /api/users/{}/reviews/", id));
    Json(Value::Array(b.reviews.lock().unwrap().clone())).into_response()
}

async fn create_review(
    State(b): State<Shared>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<Value>
) -> Response {
    b.record(format!("POST /api/users/{}/reviews/", id));
    if !b.authorized(&headers) {
        return unauthorized();
    }
    let mut reviews = b.reviews.lock().unwrap();
    let review =
        json!({
        "id": reviews.len() + 1,
        "rating": body.get("rating").cloned().unwrap_or(Value::Null),
        "text": body.get("text").cloned().unwrap_or(Value::Null),
        "author": { "id": 1, "username": USERNAME },
        "created_at": "2025-03-02T12:00:00Z"
    });
    reviews.push(review.clone());
    (StatusCode::CREATED, Json(review)).into_response()
}

pub struct TestServer {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub backend: Arc<Backend>,
}

pub async fn spawn_backend() -> TestServer {
    let backend = Arc::new(Backend::new());
    let app = Router::new()
        .route("/api/token/", post(obtain_token))
        .route("/api/token/refresh/", post(refresh_token))
        .route("/api/profile/", get(profile))
        .route("/api/register/", post(register))
        .route("/api/boom/", get(boom))
        .route("/api/slow/", get(slow))
        .route("/api/chats/{id}/", get(chat_detail))
        .route("/api/chats/{id}/messages/", get(chat_messages))
        .route("/api/chats/{id}/send/", post(chat_send))
        .route("/api/pets/{id}/toggle_active/", post(toggle_active))
        .route("/api/users/{id}/", get(user_detail))
        .route("/api/users/{id}/reviews/", get(list_reviews).post(create_review))
        .route("/ws/chat/{id}/", get(chat_socket))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        api_base_url: format!("http://{}/api", addr),
        ws_base_url: format!("ws://{}", addr),
        backend,
    }
}

/// Polls `check` until it holds or five seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

pub struct TestClient {
    pub api: ApiClient,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn client_for(server: &TestServer) -> TestClient {
    client_with_config(ClientConfig::new(server.api_base_url.clone(), server.ws_base_url.clone()))
}

pub fn client_with_config(config: ClientConfig) -> TestClient {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let api = ApiClient::new(&config, store.clone(), notifier.clone()).unwrap();
    TestClient { api, store, notifier }
}

impl TestClient {
    pub async fn seed(&self, access: Option<&str>, refresh: Option<&str>) {
        if let Some(access) = access {
            self.store.set("access_token", access).await.unwrap();
        }
        if let Some(refresh) = refresh {
            self.store.set("refresh_token", refresh).await.unwrap();
        }
    }
}
