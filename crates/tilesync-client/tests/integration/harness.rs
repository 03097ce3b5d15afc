//! Test harness: an in-process tile server speaking the real wire formats.
//!
//! POST /app/click      JSON byte-array envelope -> ClickRequest, broadcast TileUpdate
//! GET  /app/ownerships base64 envelope of the current Ownerships
//! GET  /ws/listen      binary TileUpdate frames

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tilesync_client::{ClientConfig, Ownerships};
use tilesync_protocol::{
    decode, encode, ownerships_to_wire, ClickRequest, RequestEnvelope, ResponseEnvelope,
    TileUpdate,
};
use tokio::sync::broadcast;

/// What the server pushes to every connected listener.
#[derive(Debug, Clone)]
pub enum Push {
    Frame(Vec<u8>),
    Close,
}

pub struct ServerState {
    pub ownerships: Mutex<Ownerships>,
    pub clicks: Mutex<Vec<ClickRequest>>,
    /// When set, clicks are rejected with this status and body.
    pub click_failure: Mutex<Option<(StatusCode, String)>>,
    /// When set, accepted clicks answer 200 with this plain-text body.
    pub click_reply: Mutex<Option<String>>,
    pub push: broadcast::Sender<Push>,
    pub connected: AtomicUsize,
    pub disconnected: AtomicUsize,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<ServerState>,
    _handle: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn start(ownerships: Ownerships) -> Self {
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(ServerState {
            ownerships: Mutex::new(ownerships),
            clicks: Mutex::new(Vec::new()),
            click_failure: Mutex::new(None),
            click_reply: Mutex::new(None),
            push,
            connected: AtomicUsize::new(0),
            disconnected: AtomicUsize::new(0),
        });

        let router = Router::new()
            .route("/app/click", post(click))
            .route("/app/ownerships", get(ownerships_handler))
            .route("/ws/listen", get(listen))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            addr,
            state,
            _handle: handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(format!("http://{}", self.addr)).with_timeout_ms(5_000)
    }

    pub fn fail_clicks(&self, status: StatusCode, body: &str) {
        *self.state.click_failure.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn reply_to_clicks(&self, body: &str) {
        *self.state.click_reply.lock().unwrap() = Some(body.to_string());
    }

    pub fn push_frame(&self, bytes: Vec<u8>) {
        let _ = self.state.push.send(Push::Frame(bytes));
    }

    pub fn push_update(&self, tile_id: u32, country: &str) {
        self.push_frame(encode(&TileUpdate {
            tile_id,
            country_id: country.into(),
        }));
    }

    pub fn close_listeners(&self) {
        let _ = self.state.push.send(Push::Close);
    }

    /// Poll until `n` listeners are connected.
    pub async fn wait_connected(&self, n: usize) {
        wait_until(|| self.state.connected.load(Ordering::SeqCst) >= n).await;
    }

    /// Poll until `n` listeners have gone away.
    pub async fn wait_disconnected(&self, n: usize) {
        wait_until(|| self.state.disconnected.load(Ordering::SeqCst) >= n).await;
    }
}

pub async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timeout waiting for condition");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn click(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    if let Some((status, text)) = state.click_failure.lock().unwrap().clone() {
        return (status, text).into_response();
    }

    let envelope = match RequestEnvelope::from_json(&body) {
        Ok(envelope) => envelope,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let request: ClickRequest = match decode(&envelope.data) {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    state
        .ownerships
        .lock()
        .unwrap()
        .insert(request.tile_id, request.country_id.clone());
    let _ = state.push.send(Push::Frame(encode(&TileUpdate {
        tile_id: request.tile_id,
        country_id: request.country_id.clone(),
    })));
    state.clicks.lock().unwrap().push(request);

    match state.click_reply.lock().unwrap().clone() {
        Some(body) => (StatusCode::OK, body).into_response(),
        // Acceptance only; no payload.
        None => StatusCode::OK.into_response(),
    }
}

async fn ownerships_handler(State(state): State<Arc<ServerState>>) -> Response {
    let wire = ownerships_to_wire(&state.ownerships.lock().unwrap());
    let bytes = encode(&wire);
    let data = if bytes.is_empty() { None } else { Some(bytes) };
    match ResponseEnvelope::new(data).to_json() {
        Ok(json) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            json,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn listen(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let rx = state.push.subscribe();
    ws.on_upgrade(move |socket| push_updates(socket, rx, state))
}

async fn push_updates(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<Push>,
    state: Arc<ServerState>,
) {
    state.connected.fetch_add(1, Ordering::SeqCst);
    loop {
        tokio::select! {
            push = rx.recv() => match push {
                Ok(Push::Frame(bytes)) => {
                    if socket.send(Message::Binary(bytes)).await.is_err() {
                        break;
                    }
                }
                Ok(Push::Close) | Err(_) => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    state.disconnected.fetch_add(1, Ordering::SeqCst);
}
