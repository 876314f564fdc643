//! Transport abstraction
//!
//! A transport is a duplex channel of binary messages. Connections own one
//! transport each and never look below this trait.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::error::DriverResult;

/// Duplex binary message channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel. Calling it again after a close reopens it.
    async fn connect(&self) -> DriverResult<()>;

    /// Send one binary message.
    async fn write(&self, data: Bytes) -> DriverResult<()>;

    /// Receive the next binary message; `None` once the peer closed cleanly.
    async fn read(&self) -> DriverResult<Option<Bytes>>;

    /// Close the channel.
    async fn close(&self) -> DriverResult<()>;

    /// Whether the channel is closed.
    fn is_closed(&self) -> bool;
}

/// Creates transports for new connections.
pub trait TransportFactory: Send + Sync {
    /// Create an unconnected transport for `url`.
    fn create(&self, url: &Url) -> Arc<dyn Transport>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory transport for tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::{Bytes, BytesMut};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use url::Url;

    use super::{Transport, TransportFactory};
    use crate::driver::error::{DriverError, DriverResult};
    use crate::graphbinary::message::{deserialize_request, serialize_response};
    use crate::graphbinary::{Request, Response};

    /// Builds the responses a fake server sends back for one request.
    pub(crate) type Responder = dyn Fn(&Request) -> Vec<Response> + Send + Sync;

    /// Transport backed by an in-memory queue.
    ///
    /// Written frames are recorded. Inbound frames are pushed with
    /// [`MockTransport::push_response`] or produced by a responder; pushing
    /// `None` simulates the server closing the socket. A hanging transport
    /// never finishes connecting.
    pub(crate) struct MockTransport {
        inbound_tx: mpsc::UnboundedSender<Option<Bytes>>,
        inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Option<Bytes>>>,
        written: Mutex<Vec<Bytes>>,
        responder: Option<Arc<Responder>>,
        fail_connect: AtomicBool,
        hang_connect: AtomicBool,
        connected: AtomicBool,
        connects: AtomicUsize,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            Self {
                inbound_tx,
                inbound_rx: tokio::sync::Mutex::new(inbound_rx),
                written: Mutex::new(Vec::new()),
                responder: None,
                fail_connect: AtomicBool::new(false),
                hang_connect: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
            }
        }

        /// Answer every written request with the responses `responder` builds.
        pub(crate) fn with_responder(responder: Arc<Responder>) -> Self {
            Self {
                responder: Some(responder),
                ..Self::new()
            }
        }

        pub(crate) fn failing() -> Self {
            let transport = Self::new();
            transport.fail_connect.store(true, Ordering::SeqCst);
            transport
        }

        pub(crate) fn hanging() -> Self {
            let transport = Self::new();
            transport.hang_connect.store(true, Ordering::SeqCst);
            transport
        }

        pub(crate) fn push_response(&self, response: &Response) {
            let frame = serialize_response(response).map(BytesMut::freeze);
            if let Ok(frame) = frame {
                let _ = self.inbound_tx.send(Some(frame));
            }
        }

        pub(crate) fn push_raw(&self, frame: Bytes) {
            let _ = self.inbound_tx.send(Some(frame));
        }

        pub(crate) fn server_close(&self) {
            let _ = self.inbound_tx.send(None);
        }

        pub(crate) fn written_requests(&self) -> Vec<Request> {
            self.written
                .lock()
                .iter()
                .filter_map(|frame| deserialize_request(frame).ok())
                .map(|(_, request)| request)
                .collect()
        }

        pub(crate) fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn connect(&self) -> DriverResult<()> {
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(DriverError::connection("connection refused"));
            }
            if self.hang_connect.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.connects.fetch_add(1, Ordering::SeqCst);
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn write(&self, data: Bytes) -> DriverResult<()> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(DriverError::connection("transport not connected"));
            }
            self.written.lock().push(data.clone());
            if let Some(responder) = &self.responder {
                if let Ok((_, request)) = deserialize_request(&data) {
                    for response in responder(&request) {
                        self.push_response(&response);
                    }
                }
            }
            Ok(())
        }

        async fn read(&self) -> DriverResult<Option<Bytes>> {
            let mut rx = self.inbound_rx.lock().await;
            match rx.recv().await {
                Some(Some(frame)) => Ok(Some(frame)),
                _ => {
                    self.connected.store(false, Ordering::SeqCst);
                    Ok(None)
                }
            }
        }

        async fn close(&self) -> DriverResult<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_closed(&self) -> bool {
            !self.connected.load(Ordering::SeqCst)
        }
    }

    /// Factory handing out mock transports and remembering them.
    pub(crate) struct MockTransportFactory {
        responder: Option<Arc<Responder>>,
        fail_connect: bool,
        hang_connect: bool,
        created: Mutex<Vec<Arc<MockTransport>>>,
    }

    impl MockTransportFactory {
        pub(crate) fn new() -> Self {
            Self {
                responder: None,
                fail_connect: false,
                hang_connect: false,
                created: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_responder(
            responder: impl Fn(&Request) -> Vec<Response> + Send + Sync + 'static,
        ) -> Self {
            Self {
                responder: Some(Arc::new(responder)),
                ..Self::new()
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail_connect: true,
                ..Self::new()
            }
        }

        pub(crate) fn hanging() -> Self {
            Self {
                hang_connect: true,
                ..Self::new()
            }
        }

        pub(crate) fn created(&self) -> Vec<Arc<MockTransport>> {
            self.created.lock().clone()
        }

        /// Requests written across every transport created so far.
        pub(crate) fn written_requests(&self) -> Vec<Request> {
            self.created
                .lock()
                .iter()
                .flat_map(|t| t.written_requests())
                .collect()
        }
    }

    impl TransportFactory for MockTransportFactory {
        fn create(&self, _url: &Url) -> Arc<dyn Transport> {
            let transport = Arc::new(match (&self.responder, self.fail_connect, self.hang_connect) {
                (_, true, _) => MockTransport::failing(),
                (_, false, true) => MockTransport::hanging(),
                (Some(responder), false, false) => MockTransport::with_responder(responder.clone()),
                (None, false, false) => MockTransport::new(),
            });
            self.created.lock().push(transport.clone());
            transport
        }
    }
}
