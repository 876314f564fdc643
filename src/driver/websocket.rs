//! WebSocket transport built on tokio-tungstenite.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::error::{DriverError, DriverResult};
use super::transport::{Transport, TransportFactory};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport over a single WebSocket.
///
/// The sink and stream halves sit behind separate locks so that writers and
/// the connection's read loop never wait on each other.
pub struct WebSocketTransport {
    url: Url,
    connect_timeout: Duration,
    sink: Mutex<Option<SplitSink<WsStream, Message>>>,
    stream: Mutex<Option<SplitStream<WsStream>>>,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Create an unconnected transport.
    pub fn new(url: Url, connect_timeout: Duration) -> Self {
        Self {
            url,
            connect_timeout,
            sink: Mutex::new(None),
            stream: Mutex::new(None),
            closed: AtomicBool::new(true),
        }
    }

    /// Server URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn send_message(&self, message: Message) -> DriverResult<()> {
        let mut sink = self.sink.lock().await;
        let sink = sink
            .as_mut()
            .ok_or_else(|| DriverError::connection(format!("not connected to {}", self.url)))?;
        sink.send(message).await.map_err(|e| {
            self.closed.store(true, Ordering::SeqCst);
            DriverError::connection(format!("failed to send to {}: {}", self.url, e))
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> DriverResult<()> {
        let (ws, _response) = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| DriverError::timeout(format!("connecting to {}", self.url)))?
            .map_err(|e| match e {
                WsError::Io(io) => DriverError::Io(io),
                other => DriverError::connection(format!("failed to connect to {}: {}", self.url, other)),
            })?;

        let (sink, stream) = ws.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.closed.store(false, Ordering::SeqCst);

        tracing::debug!(url = %self.url, "established WebSocket connection");
        Ok(())
    }

    async fn write(&self, data: Bytes) -> DriverResult<()> {
        self.send_message(Message::Binary(data.to_vec())).await
    }

    async fn read(&self) -> DriverResult<Option<Bytes>> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| DriverError::connection(format!("not connected to {}", self.url)))?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(Bytes::from(data))),
                Some(Ok(Message::Ping(data))) => {
                    self.send_message(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Ok(None);
                }
                Some(Ok(_)) => {
                    // text and pong frames carry nothing for us
                }
                Some(Err(e)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    return Err(DriverError::connection(format!(
                        "WebSocket error from {}: {}",
                        self.url, e
                    )));
                }
            }
        }
    }

    async fn close(&self) -> DriverResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.close().await;
        }
        // The read loop may hold the stream half; it sees the close frame.
        if let Ok(mut stream) = self.stream.try_lock() {
            stream.take();
        }
        tracing::debug!(url = %self.url, "WebSocket connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Creates [`WebSocketTransport`]s.
#[derive(Debug, Clone)]
pub struct WebSocketTransportFactory {
    connect_timeout: Duration,
}

impl WebSocketTransportFactory {
    /// Create a factory whose transports use `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketTransportFactory {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl TransportFactory for WebSocketTransportFactory {
    fn create(&self, url: &Url) -> Arc<dyn Transport> {
        Arc::new(WebSocketTransport::new(url.clone(), self.connect_timeout))
    }
}
