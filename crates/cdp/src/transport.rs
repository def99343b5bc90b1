//! Transport seam - a duplex, message-oriented byte stream to the
//! debuggee.
//!
//! The engine neither establishes nor tears down the underlying stream
//! semantics; it only reads and writes whole text messages. A transport
//! splits into independent sink and stream halves so the writer task and
//! the read loop can own their side outright.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("transport closed")]
    Closed,
}

/// Write half. One writer task owns this at a time.
#[async_trait]
pub trait TransportSink: Send {
    /// Send one whole outbound message.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Flush and close the write side.
    async fn close(&mut self);
}

/// Read half. The read loop owns this.
#[async_trait]
pub trait TransportStream: Send {
    /// Next whole inbound message, or `None` once the peer is gone.
    async fn next(&mut self) -> Option<Result<String, TransportError>>;
}

/// A connected duplex transport, ready to be split.
pub trait Transport: Send {
    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportStream>);
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// WebSocket transport to a debugger endpoint
/// (e.g. `ws://localhost:9222/devtools/browser/<id>`).
pub struct WebSocketTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    pub async fn connect(endpoint: &str) -> crate::error::Result<Self> {
        let endpoint = url::Url::parse(endpoint)?;
        let (inner, _) = connect_async(endpoint.as_str())
            .await
            .map_err(TransportError::WebSocket)?;
        tracing::debug!(endpoint = %endpoint, "websocket connected");
        Ok(Self { inner })
    }
}

impl Transport for WebSocketTransport {
    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportStream>) {
        let (sink, stream) = self.inner.split();
        (
            Box::new(WebSocketSink { sink }),
            Box::new(WebSocketReader { stream }),
        )
    }
}

struct WebSocketSink {
    sink: WsSink,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink.send(WsMessage::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            tracing::debug!(error = %e, "websocket close failed");
        }
    }
}

struct WebSocketReader {
    stream: WsStream,
}

#[async_trait]
impl TransportStream for WebSocketReader {
    async fn next(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Some(Ok(text)),
                Some(Ok(WsMessage::Close(_))) | None => return None,
                Some(Ok(_)) => continue, // ping/pong/binary
                Some(Err(e)) => return Some(Err(e.into())),
            }
        }
    }
}

/// In-process transport pair. Frames sent on one side arrive on the
/// other. Serves as the reference transport for the engine's tests and
/// for embedders that already own a message stream.
pub struct MemoryTransport {
    tx: mpsc::Sender<String>,
    rx: mpsc::Receiver<String>,
}

impl MemoryTransport {
    const CAPACITY: usize = 64;

    /// Returns (a, b) where frames sent on `a` arrive on `b` and vice
    /// versa.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel(Self::CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(Self::CAPACITY);
        (
            Self { tx: tx_b, rx: rx_a },
            Self { tx: tx_a, rx: rx_b },
        )
    }

    /// Send a raw frame to the peer. Used by scripted test peers.
    pub async fn send(&self, frame: impl Into<String>) -> Result<(), TransportError> {
        self.tx
            .send(frame.into())
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Receive the next frame from the peer, `None` once it is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

impl Transport for MemoryTransport {
    fn split(self: Box<Self>) -> (Box<dyn TransportSink>, Box<dyn TransportStream>) {
        (
            Box::new(MemorySink { tx: Some(self.tx) }),
            Box::new(MemoryReader { rx: self.rx }),
        )
    }
}

struct MemorySink {
    tx: Option<mpsc::Sender<String>>,
}

#[async_trait]
impl TransportSink for MemorySink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx.send(frame).await.map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

struct MemoryReader {
    rx: mpsc::Receiver<String>,
}

#[async_trait]
impl TransportStream for MemoryReader {
    async fn next(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}
