mod message_log;

pub use message_log::MessageLog;

use futures::stream::{ SplitSink, SplitStream };
use futures::{ SinkExt, StreamExt };
use log::{ debug, info, warn };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use tokio::net::TcpStream;
use tokio::sync::{ broadcast, oneshot };
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{ connect_async, MaybeTlsStream, WebSocketStream };
use url::Url;

use crate::api::{ ApiClient, ApiError };
use crate::models::chat::{ Chat, Message };
use crate::models::websocket::{ ClientFrame, ServerFrame };

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const UPDATE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    /// Written to the live socket; the message arrives with the server's echo.
    Socket,
    /// Sent over HTTP and already appended.
    Http(Message),
}

/// State shared between the session and its socket reader task.
struct Inbox {
    chat_id: u64,
    log: Mutex<MessageLog>,
    state: Mutex<ConnectionState>,
    updates: broadcast::Sender<Message>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inbox {
    fn append(&self, message: Message) -> bool {
        let appended = lock(&self.log).append(message.clone());
        if appended {
            let _ = self.updates.send(message);
        } else {
            debug!("Chat {}: message {} already shown", self.chat_id, message.id);
        }
        appended
    }

    fn accept_frame(&self, payload: &str) -> bool {
        match serde_json::from_str::<ServerFrame>(payload) {
            Ok(ServerFrame::Message { message }) if message.chat != self.chat_id => {
                warn!("Chat {}: dropping message {} addressed to chat {}", self.chat_id, message.id, message.chat);
                false
            }
            Ok(ServerFrame::Message { message }) => self.append(message),
            Err(e) => {
                warn!("Chat {}: dropping malformed frame: {}", self.chat_id, e);
                false
            }
        }
    }

    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }
}

/// One open conversation: history over HTTP, live messages over a socket,
/// and sends that fall back to HTTP whenever the socket is not connected.
pub struct ChatSession {
    api: ApiClient,
    ws_base_url: String,
    chat: Option<Chat>,
    inbox: Arc<Inbox>,
    writer: Option<SplitSink<WsStream, WsMessage>>,
    reader: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ChatSession {
    /// A disconnected session with an empty message list.
    pub fn new(api: ApiClient, ws_base_url: &str, chat_id: u64) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            api,
            ws_base_url: ws_base_url.to_string(),
            chat: None,
            inbox: Arc::new(Inbox {
                chat_id,
                log: Mutex::new(MessageLog::new()),
                state: Mutex::new(ConnectionState::Disconnected),
                updates,
            }),
            writer: None,
            reader: None,
            shutdown: None,
        }
    }

    /// Loads the conversation and its history, then goes live. Failures
    /// leave the session usable: an empty list and HTTP sends.
    pub async fn open(api: ApiClient, ws_base_url: &str, chat_id: u64) -> Self {
        let mut session = Self::new(api, ws_base_url, chat_id);
        session.load_history().await;
        session.connect().await;
        session
    }

    /// Fetches the conversation, then its messages. Any failure stops the
    /// load after the one notice the API client raised for it.
    pub async fn load_history(&mut self) {
        let chat_id = self.chat_id();
        if let Err(e) = self.api.ensure_session().await {
            warn!("Chat {}: not loading history: {}", chat_id, e);
            return;
        }
        match self.api.get_chat(chat_id).await {
            Ok(chat) => {
                self.chat = Some(chat);
            }
            Err(e) => {
                warn!("Chat {}: could not load conversation: {}", chat_id, e);
                return;
            }
        }
        match self.api.chat_messages(chat_id).await {
            Ok(history) => {
                let count = history.len();
                for message in history {
                    self.inbox.append(message);
                }
                info!("Chat {}: loaded {} messages", chat_id, count);
            }
            Err(e) => warn!("Chat {}: could not load history: {}", chat_id, e),
        }
    }

    /// Opens the live socket, closing any socket opened earlier. Without an
    /// access token, or when the handshake fails, the session stays
    /// disconnected and sends go over HTTP.
    pub async fn connect(&mut self) -> ConnectionState {
        let chat_id = self.chat_id();
        self.shutdown_socket().await;
        let token = match self.api.session().access_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!("Chat {}: not logged in, live updates disabled", chat_id);
                return ConnectionState::Disconnected;
            }
            Err(e) => {
                warn!("Chat {}: could not read access token: {}", chat_id, e);
                return ConnectionState::Disconnected;
            }
        };
        let url = match socket_url(&self.ws_base_url, chat_id, &token) {
            Ok(url) => url,
            Err(e) => {
                warn!("Chat {}: invalid socket base '{}': {}", chat_id, self.ws_base_url, e);
                return ConnectionState::Disconnected;
            }
        };

        self.inbox.set_state(ConnectionState::Connecting);
        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                let (writer, stream) = ws_stream.split();
                let (shutdown_tx, shutdown_rx) = oneshot::channel();
                self.writer = Some(writer);
                self.shutdown = Some(shutdown_tx);
                self.inbox.set_state(ConnectionState::Connected);
                self.reader = Some(
                    tokio::spawn(read_frames(stream, self.inbox.clone(), shutdown_rx))
                );
                info!("Chat {}: live connection established", chat_id);
            }
            Err(e) => {
                warn!("Chat {}: live connection unavailable, sending over HTTP: {}", chat_id, e);
                self.inbox.set_state(ConnectionState::Disconnected);
            }
        }
        self.inbox.state()
    }

    /// Handles one inbound socket payload. Returns whether a message was appended.
    pub fn on_live_message(&self, payload: &str) -> bool {
        self.inbox.accept_frame(payload)
    }

    pub async fn send(&mut self, text: &str) -> Result<SendOutcome, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        if self.state() == ConnectionState::Connected {
            if let Some(writer) = self.writer.as_mut() {
                let frame = serde_json
                    ::to_string(&(ClientFrame::Message { text: text.to_string() }))
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                match writer.send(WsMessage::Text(frame)).await {
                    Ok(()) => {
                        return Ok(SendOutcome::Socket);
                    }
                    Err(e) => {
                        warn!("Chat {}: socket send failed, retrying over HTTP: {}", self.chat_id(), e);
                        self.release_socket();
                    }
                }
            }
        }

        let message = self.api.send_message(self.chat_id(), text).await?;
        self.inbox.append(message.clone());
        Ok(SendOutcome::Http(message))
    }

    /// Closes the socket and stops the reader. Safe to call more than once.
    pub async fn close(&mut self) {
        self.shutdown_socket().await;
        info!("Chat {}: closed", self.chat_id());
    }

    async fn shutdown_socket(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.close().await {
                debug!("Chat {}: close frame not delivered: {}", self.chat_id(), e);
            }
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        self.inbox.set_state(ConnectionState::Disconnected);
    }

    pub fn chat_id(&self) -> u64 {
        self.inbox.chat_id
    }

    pub fn chat(&self) -> Option<&Chat> {
        self.chat.as_ref()
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.inbox.log).messages().to_vec()
    }

    pub fn state(&self) -> ConnectionState {
        self.inbox.state()
    }

    /// Every message appended after this call, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.inbox.updates.subscribe()
    }

    fn release_socket(&mut self) {
        self.writer = None;
        self.shutdown = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.inbox.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// `{base}/ws/chat/{id}/?token=...`
pub fn socket_url(ws_base_url: &str, chat_id: u64, token: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{}/ws/chat/{}/", ws_base_url.trim_end_matches('/'), chat_id))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

async fn read_frames(
    mut stream: SplitStream<WsStream>,
    inbox: Arc<Inbox>,
    mut shutdown: oneshot::Receiver<()>
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                debug!("Chat {}: reader stopped", inbox.chat_id);
                break;
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        inbox.accept_frame(&text);
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("Chat {}: server closed the live connection", inbox.chat_id);
                        break;
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        warn!("Chat {}: ignoring binary frame", inbox.chat_id);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Chat {}: live connection error: {}", inbox.chat_id, e);
                        break;
                    }
                }
            }
        }
    }
    inbox.set_state(ConnectionState::Disconnected);
}
