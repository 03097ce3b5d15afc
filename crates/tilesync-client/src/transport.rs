//! Transport client -- request/response over HTTP, push over WebSocket.
//!
//! Both channels share one base address:
//!   request/response: `<base>/app/...` with JSON-enveloped protobuf bodies
//!   push:             `<ws|wss>://<host>[/base-path]/ws/listen`, raw binary frames
//!
//! Nothing here retries. Retry and reconnect policy belong to the caller.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use tilesync_protocol::{EnvelopeError, RequestEnvelope, ResponseEnvelope, LISTEN_PATH};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

use crate::subscription::{Subscription, SubscriptionEnd, SubscriptionGuard};

/// Base configuration shared by both channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_address: String,
    /// Applied to every HTTP request and to the push-channel handshake.
    pub timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn new(base_address: impl Into<String>) -> Self {
        Self {
            base_address: base_address.into(),
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{method} {path} failed with status {status}: {message}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        message: String,
    },
    #[error("{method} {path} request failed: {source}")]
    Request {
        method: Method,
        path: String,
        source: reqwest::Error,
    },
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("invalid base address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("push channel connection to {url} failed: {source}")]
    Connect {
        url: String,
        source: Box<tungstenite::Error>,
    },
    #[error("push channel connection to {url} timed out after {timeout_ms}ms")]
    ConnectTimeout { url: String, timeout_ms: u64 },
}

/// The two channels every backend transport provides.
pub trait Transport: Send + Sync {
    /// Issue one request. `body` is already protobuf-encoded; it is wrapped in
    /// the JSON envelope here. Returns `None` when the response carries no
    /// payload.
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Open the push channel. `on_frame` sees every binary frame, in arrival
    /// order, until the returned subscription is closed or the stream ends.
    fn subscribe<F>(
        &self,
        on_frame: F,
    ) -> impl Future<Output = Result<Subscription, TransportError>> + Send
    where
        F: FnMut(&[u8]) + Send + 'static;
}

/// `reqwest` + `tokio-tungstenite` transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    push_url: Url,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let base_url = request_base(&config.base_address)?;
        let push_url = push_url(&config.base_address)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::InvalidAddress {
                address: config.base_address.clone(),
                reason: format!("http client init failed: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            push_url,
            timeout: config.timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn push_url(&self) -> &Url {
        &self.push_url
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "sending request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.body(RequestEnvelope::new(body).to_json()?);
        }

        let request_failed = |source| TransportError::Request {
            method: method.clone(),
            path: path.to_string(),
            source,
        };
        let resp = request.send().await.map_err(request_failed)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(request_failed)?;

        if !status.is_success() {
            return Err(TransportError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(ResponseEnvelope::unwrap_body(&body)?)
    }

    async fn subscribe<F>(&self, mut on_frame: F) -> Result<Subscription, TransportError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let url = self.push_url.to_string();
        let connect = tokio_tungstenite::connect_async(url.as_str());
        let connected = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect).await.map_err(|_| {
                TransportError::ConnectTimeout {
                    url: url.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            })?,
            None => connect.await,
        };
        let (ws, _response) = connected.map_err(|e| TransportError::Connect {
            url: url.clone(),
            source: Box::new(e),
        })?;
        tracing::info!(url = %url, "push channel connected");

        let (subscription, guard) = Subscription::pair();
        tokio::spawn(async move {
            let (mut sink, stream) = ws.split();
            let end = pump_frames(stream, &guard, &mut on_frame).await;
            if end == SubscriptionEnd::Disposed {
                if let Err(e) = sink.send(WsMessage::Close(None)).await {
                    tracing::debug!(url = %url, "close frame not sent: {e}");
                }
            }
            tracing::info!(url = %url, end = %end, "push channel ended");
            guard.finish(end);
        });

        Ok(subscription)
    }
}

/// Forward binary frames to `on_frame` until the guard is cancelled or the
/// stream ends. Returns the terminal state.
pub(crate) async fn pump_frames<S, F>(
    mut frames: S,
    guard: &SubscriptionGuard,
    on_frame: &mut F,
) -> SubscriptionEnd
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
    F: FnMut(&[u8]),
{
    loop {
        let next = tokio::select! {
            biased;
            _ = guard.cancelled() => return SubscriptionEnd::Disposed,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(WsMessage::Binary(payload))) => {
                if !guard.is_open() {
                    return SubscriptionEnd::Disposed;
                }
                on_frame(&payload);
            }
            Some(Ok(WsMessage::Text(text))) => {
                tracing::warn!(len = text.len(), "dropping text frame on push channel");
            }
            Some(Ok(WsMessage::Close(frame))) => {
                tracing::debug!(?frame, "push channel close frame received");
                return SubscriptionEnd::Closed;
            }
            // Ping/pong are answered by tungstenite.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!("push channel error: {e}");
                return SubscriptionEnd::Failed {
                    reason: e.to_string(),
                };
            }
            None => return SubscriptionEnd::Closed,
        }
    }
}

/// Accept `host:port`, `//host:port` or a full URL; default to http.
fn with_scheme(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address.trim_start_matches("//"))
    }
}

fn invalid(address: &str, reason: impl Into<String>) -> TransportError {
    TransportError::InvalidAddress {
        address: address.to_string(),
        reason: reason.into(),
    }
}

/// Request/response base: the address with a scheme and no trailing slash.
pub fn request_base(address: &str) -> Result<String, TransportError> {
    let full = with_scheme(address);
    let url = Url::parse(&full).map_err(|e| invalid(address, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(full.trim_end_matches('/').to_string()),
        other => Err(invalid(address, format!("unsupported scheme {other:?}"))),
    }
}

/// Derive the push-channel URL: same host and base path, push scheme,
/// fixed `/ws/listen` suffix.
pub fn push_url(address: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(&with_scheme(address)).map_err(|e| invalid(address, e.to_string()))?;
    if !url.has_host() {
        return Err(invalid(address, "missing host"));
    }
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(address, format!("unsupported scheme {other:?}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(address, format!("cannot switch scheme to {scheme}")))?;

    let path = format!("{}{}", url.path().trim_end_matches('/'), LISTEN_PATH);
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
