//! WebSocket feed connection with automatic reconnection
//!
//! ## Lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──ok──▶ Connected
//!      ▲                          │                  │
//!      └──────────err─────────────┘      read error  │
//!      ▲                                             ▼
//!      └─── close() ◀── Closing          Disconnected ─▶ FixedIntervalRetry ─▶ Connected
//! ```
//!
//! The first `connect()` is the caller's responsibility: a failed handshake is
//! returned, never retried. Once connected, a supervisor task owns the socket. It runs
//! the read loop and the keepalive pinger side by side and, after any read error,
//! redials through [`FixedIntervalRetry`] until it succeeds or shutdown is requested.
//!
//! Every data frame goes into one bounded queue. A full queue blocks the read loop;
//! frames are never dropped to make room.

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::FeedConfig;
use crate::input::reconnect::FixedIntervalRetry;
use crate::{AdapterError, Result};

/// Transport-level WebSocket error
pub type WsError = tokio_tungstenite::tungstenite::Error;

/// Write half of a feed socket
pub type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

/// Read half of a feed socket
pub type FrameStream = Pin<Box<dyn Stream<Item = std::result::Result<Message, WsError>> + Send>>;

/// A live, split feed socket
pub struct FeedLink {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Establishes feed sockets
///
/// Production code dials with [`TungsteniteDialer`]; tests script their own.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Perform the handshake with `url`
    async fn dial(&self, url: &str) -> Result<FeedLink>;
}

/// Dials real WebSocket endpoints through tokio-tungstenite
#[derive(Debug, Clone)]
pub struct TungsteniteDialer {
    connect_timeout: Duration,
}

impl TungsteniteDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, url: &str) -> Result<FeedLink> {
        match timeout(self.connect_timeout, connect_async(url)).await {
            Ok(Ok((ws_stream, response))) => {
                tracing::info!("Connected to {} with response: {:?}", url, response.status());
                let (sink, stream) = ws_stream.split();
                Ok(FeedLink {
                    sink: Box::pin(sink),
                    stream: Box::pin(stream),
                })
            }
            Ok(Err(e)) => Err(AdapterError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(AdapterError::ConnectionTimeout {
                url: url.to_string(),
                timeout_ms: self.connect_timeout.as_millis() as u64,
            }),
        }
    }
}

/// Connection states for the feed lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; either never connected or between reconnection attempts
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Socket open and read loop running
    Connected,
    /// Explicit close requested; no further reconnection
    Closing,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
        }
    }
}

/// Build the combined-stream endpoint for `streams`.
///
/// A trailing `/` is dropped and a `/ws` raw-stream base is rewritten to `/stream`;
/// the streams are joined with `/` in the order given.
pub fn build_stream_url(base: &str, streams: &[String]) -> Result<String> {
    if streams.is_empty() {
        return Err(AdapterError::Configuration(
            "At least one stream is required".to_string(),
        ));
    }

    let mut base = base.trim_end_matches('/').to_string();
    if let Some(stripped) = base.strip_suffix("/ws") {
        base = format!("{}/stream", stripped);
    }

    let url = format!("{}?streams={}", base, streams.join("/"));
    let parsed = Url::parse(&url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(AdapterError::Configuration(format!(
            "Unsupported URL scheme '{}' for feed endpoint",
            other
        ))),
    }
}

/// Why a connected session ended
enum SessionEnd {
    /// Shutdown token fired
    Shutdown,
    /// Nobody is consuming frames any more
    QueueClosed,
    /// Read error or remote close
    Failed(AdapterError),
}

/// Kline feed connector with automatic reconnection
pub struct FeedConnector<D: Dialer = TungsteniteDialer> {
    inner: Arc<Inner<D>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

struct Inner<D> {
    config: FeedConfig,
    dialer: D,
    retry: FixedIntervalRetry,
    state: watch::Sender<ConnectionState>,
    sink: tokio::sync::Mutex<Option<FrameSink>>,

    // Sender moves into the supervisor on first successful connect; dropping it is
    // what closes the queue for downstream stages.
    frames_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    frames_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,

    shutdown: CancellationToken,

    // Tracking
    frames_received: AtomicU64,
    reconnect_attempts: AtomicU64,
}

impl<D: Dialer> FeedConnector<D> {
    /// Create a connector; it stops when `shutdown` (or its own `close()`) fires
    pub fn new(config: FeedConfig, dialer: D, shutdown: &CancellationToken) -> Self {
        let (frames_tx, frames_rx) = mpsc::channel(config.queue_capacity.max(1));
        let retry = FixedIntervalRetry::new(config.reconnect_interval());

        Self {
            inner: Arc::new(Inner {
                config,
                dialer,
                retry,
                state: watch::Sender::new(ConnectionState::Disconnected),
                sink: tokio::sync::Mutex::new(None),
                frames_tx: Mutex::new(Some(frames_tx)),
                frames_rx: Mutex::new(Some(frames_rx)),
                shutdown: shutdown.child_token(),
                frames_received: AtomicU64::new(0),
                reconnect_attempts: AtomicU64::new(0),
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Take the receiving end of the raw frame queue (only once)
    pub fn take_frames(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.inner.frames_rx.lock().take()
    }

    /// Connect to the combined stream for `streams` and start the read loop.
    ///
    /// Failure is returned to the caller without any retry. Calling this while the
    /// connector is already connected, or already supervising a connection, is a no-op.
    pub async fn connect(&self, streams: &[String]) -> Result<()> {
        if self.inner.shutdown.is_cancelled() {
            return Err(AdapterError::ShutDown);
        }

        if self.inner.frames_tx.lock().is_none() {
            tracing::debug!("Feed connection already supervised; connect() ignored");
            return Ok(());
        }

        let url = build_stream_url(&self.inner.config.websocket_url, streams)?;
        let link = self.inner.dial(&url).await?;

        let taken = self.inner.frames_tx.lock().take();
        let frames_tx = match taken {
            Some(tx) => tx,
            None => {
                // Lost a race with a concurrent connect(); keep the first session
                let mut sink = link.sink;
                sink.close().await.ok();
                return Ok(());
            }
        };

        self.inner.install(link.sink).await;
        tracing::info!("Subscribed to {} kline streams", streams.len());

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(inner.supervise(link.stream, frames_tx, url));
        *self.supervisor.lock() = Some(handle);

        Ok(())
    }

    /// Close the connection and stop any reconnection in progress.
    ///
    /// Returns once the supervisor task has exited and the frame queue is closed.
    pub async fn close(&self) -> Result<()> {
        self.inner.set_state(ConnectionState::Closing);
        self.inner.shutdown.cancel();

        let sink = self.inner.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                tracing::debug!("Error closing feed socket: {}", e);
            }
        }

        // Never connected: no supervisor will drop the sender, so do it here
        self.inner.frames_tx.lock().take();

        let supervisor = self.supervisor.lock().take();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                tracing::error!("Feed supervisor task failed: {}", e);
            }
        }

        self.inner.set_state(ConnectionState::Disconnected);
        tracing::info!("Feed connector closed");
        Ok(())
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions as they happen
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Data frames read from the socket so far
    pub fn frames_received(&self) -> u64 {
        self.inner.frames_received.load(Ordering::Relaxed)
    }

    /// Reconnection dials attempted so far
    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::Relaxed)
    }
}

impl<D: Dialer> Inner<D> {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            // Closing only ever gives way to Disconnected
            if *state == ConnectionState::Closing && next != ConnectionState::Disconnected {
                return false;
            }
            if *state == next {
                return false;
            }
            tracing::debug!("Feed connection {:?} -> {:?}", *state, next);
            *state = next;
            true
        });
    }

    async fn dial(&self, url: &str) -> Result<FeedLink> {
        self.set_state(ConnectionState::Connecting);
        tracing::info!("Connecting to kline feed at {}", url);

        match self.dialer.dial(url).await {
            Ok(link) => Ok(link),
            Err(e) => {
                tracing::error!("Feed connection error: {}", e);
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn install(&self, sink: FrameSink) {
        *self.sink.lock().await = Some(sink);
        self.set_state(ConnectionState::Connected);
    }

    /// Own the connection until shutdown: read, ping, and redial after failures
    async fn supervise(
        self: Arc<Self>,
        mut stream: FrameStream,
        frames_tx: mpsc::Sender<Vec<u8>>,
        url: String,
    ) {
        loop {
            let end = tokio::select! {
                end = self.read_loop(&mut stream, &frames_tx) => end,
                _ = self.ping_loop() => SessionEnd::Shutdown,
            };

            self.sink.lock().await.take();
            self.set_state(ConnectionState::Disconnected);

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::QueueClosed => {
                    tracing::info!("Frame queue closed by consumer; stopping feed");
                    break;
                }
                SessionEnd::Failed(e) => {
                    tracing::error!("Feed read error: {}", e);
                }
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            tracing::info!(
                "Attempting to reconnect every {}ms",
                self.retry.interval().as_millis()
            );

            let inner: &Inner<D> = &self;
            let endpoint = url.as_str();
            let relinked = self
                .retry
                .run(&self.shutdown, move |_| {
                    inner.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
                    inner.dial(endpoint)
                })
                .await;

            match relinked {
                Some(link) if !self.shutdown.is_cancelled() => {
                    self.install(link.sink).await;
                    stream = link.stream;
                }
                Some(link) => {
                    // Dial finished after close(); discard it
                    let mut sink = link.sink;
                    sink.close().await.ok();
                    break;
                }
                None => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Feed supervisor stopped");
    }

    async fn read_loop(
        &self,
        stream: &mut FrameStream,
        frames_tx: &mpsc::Sender<Vec<u8>>,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
                next = stream.next() => next,
            };

            let frame = match next {
                Some(Ok(Message::Text(text))) => text.into_bytes(),
                Some(Ok(Message::Binary(data))) => data,
                // tungstenite answers pings on its own
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    return SessionEnd::Failed(AdapterError::ConnectionClosed {
                        reason: frame.map(|f| f.reason.to_string()),
                    })
                }
                Some(Err(e)) => return SessionEnd::Failed(AdapterError::WebSocket(e)),
                None => return SessionEnd::Failed(AdapterError::ConnectionClosed { reason: None }),
            };

            self.frames_received.fetch_add(1, Ordering::Relaxed);

            tokio::select! {
                _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
                sent = frames_tx.send(frame) => {
                    if sent.is_err() {
                        return SessionEnd::QueueClosed;
                    }
                }
            }
        }
    }

    /// Send a protocol ping every `ping_interval` while connected
    async fn ping_loop(&self) {
        let period = self.config.ping_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let mut guard = self.sink.lock().await;
            let Some(sink) = guard.as_mut() else {
                continue;
            };

            match sink.send(Message::Ping(Vec::new())).await {
                Ok(()) => tracing::debug!("Sent keepalive ping"),
                // The read side will surface the broken socket
                Err(e) => tracing::warn!("Keepalive ping failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streams(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stream_url_joins_in_order() {
        let url = build_stream_url(
            "wss://stream.binance.com:9443/stream",
            &streams(&["btcusdt@kline_1m", "ethusdt@kline_1m", "btcusdt@kline_5m"]),
        )
        .unwrap();
        assert_eq!(
            url,
            "wss://stream.binance.com:9443/stream?streams=btcusdt@kline_1m/ethusdt@kline_1m/btcusdt@kline_5m"
        );
    }

    #[test]
    fn test_stream_url_rewrites_raw_ws_base() {
        let url = build_stream_url("wss://host:9443/ws/", &streams(&["btcusdt@kline_1m"])).unwrap();
        assert_eq!(url, "wss://host:9443/stream?streams=btcusdt@kline_1m");
    }

    #[test]
    fn test_stream_url_requires_streams() {
        assert!(matches!(
            build_stream_url("wss://host/stream", &[]),
            Err(AdapterError::Configuration(_))
        ));
    }

    #[test]
    fn test_stream_url_rejects_bad_scheme() {
        assert!(build_stream_url("http://host/stream", &streams(&["a@kline_1m"])).is_err());
        assert!(build_stream_url("not a url", &streams(&["a@kline_1m"])).is_err());
    }

    #[test]
    fn test_connection_state_names() {
        assert_eq!(ConnectionState::Connected.as_str(), "connected");
        assert_eq!(ConnectionState::Closing.as_str(), "closing");
    }
}
