//! Connection
//!
//! One connection owns one transport, multiplexes requests over it by
//! request id and runs a background read loop that routes responses to
//! result sets.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::error::{DriverError, DriverResult};
use super::protocol::{dispatch, fail_all, fail_pending, take_orphan, take_pending, OrphanMap, PendingMap};
use super::result_set::{ResultSet, ResultSetSender, DEFAULT_RESULT_BUFFER_SIZE};
use super::transport::Transport;
use crate::graphbinary::message::serialize_request;
use crate::graphbinary::{GraphBinaryMessageCodec, Request};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport not connected yet, or lost
    New,
    /// Transport connected and read loop running
    Established,
    /// Closed for good
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::New => write!(f, "new"),
            ConnectionState::Established => write!(f, "established"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Connection to one server.
pub struct Connection {
    id: u64,
    url: Url,
    transport: Arc<dyn Transport>,
    codec: GraphBinaryMessageCodec,
    state: Arc<Mutex<ConnectionState>>,
    pending: PendingMap,
    orphans: OrphanMap,
    result_buffer_size: usize,
    read_task: Mutex<Option<JoinHandle<()>>>,
    connect_lock: tokio::sync::Mutex<()>,
}

impl Connection {
    /// Create a connection in state [`ConnectionState::New`].
    pub fn new(url: Url, transport: Arc<dyn Transport>, codec: GraphBinaryMessageCodec) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            url,
            transport,
            codec,
            state: Arc::new(Mutex::new(ConnectionState::New)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            orphans: Arc::new(Mutex::new(VecDeque::new())),
            result_buffer_size: DEFAULT_RESULT_BUFFER_SIZE,
            read_task: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Set how many values each result set buffers.
    pub fn with_result_buffer_size(mut self, size: usize) -> Self {
        self.result_buffer_size = size;
        self
    }

    /// Create a connection and connect it.
    pub async fn open(
        url: Url,
        transport: Arc<dyn Transport>,
        codec: GraphBinaryMessageCodec,
        result_buffer_size: usize,
    ) -> DriverResult<Self> {
        let connection = Self::new(url, transport, codec).with_result_buffer_size(result_buffer_size);
        connection.connect().await?;
        Ok(connection)
    }

    /// Connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Server URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Number of requests still waiting for their final response.
    pub fn active_results(&self) -> usize {
        self.pending.lock().len()
    }

    /// Connect the transport and start the read loop.
    ///
    /// No-op when already established; fails on a closed connection.
    pub async fn connect(&self) -> DriverResult<()> {
        let _guard = self.connect_lock.lock().await;
        match self.state() {
            ConnectionState::Established => return Ok(()),
            ConnectionState::Closed => return Err(DriverError::ConnectionClosed),
            ConnectionState::New => {}
        }

        self.transport.connect().await?;

        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return Err(DriverError::ConnectionClosed);
            }
            *state = ConnectionState::Established;
        }

        let task = tokio::spawn(read_loop(ReadLoop {
            connection_id: self.id,
            transport: Arc::clone(&self.transport),
            codec: self.codec.clone(),
            state: Arc::clone(&self.state),
            pending: Arc::clone(&self.pending),
            orphans: Arc::clone(&self.orphans),
            capacity: self.result_buffer_size,
        }));
        if let Some(previous) = self.read_task.lock().replace(task) {
            previous.abort();
        }

        info!(connection_id = self.id, url = %self.url, "connection established");
        Ok(())
    }

    /// Send a request and return the result set its responses fill.
    ///
    /// Returns as soon as the request is handed to the transport.
    pub async fn write(&self, request: &Request) -> DriverResult<ResultSet> {
        if self.state() != ConnectionState::Established {
            self.connect().await?;
        }

        let frame = serialize_request(request, self.codec.mime_type())?;
        let (sender, result_set) = ResultSet::channel(request.request_id, self.result_buffer_size);
        self.register(request.request_id, sender)?;

        if let Err(e) = self.transport.write(frame.freeze()).await {
            self.pending.lock().remove(&request.request_id);
            warn!(connection_id = self.id, request_id = %request.request_id, error = %e, "write failed");
            return Err(e);
        }

        debug!(
            connection_id = self.id,
            request_id = %request.request_id,
            op = %request.op,
            "request sent"
        );
        Ok(result_set)
    }

    /// Register a pending request. Checked under the state lock so a read
    /// loop that is shutting down cannot miss it.
    fn register(&self, request_id: Uuid, sender: ResultSetSender) -> DriverResult<()> {
        let state = self.state.lock();
        if *state != ConnectionState::Established {
            return Err(DriverError::ConnectionClosed);
        }
        self.pending.lock().insert(request_id, sender);
        Ok(())
    }

    /// Close the connection.
    ///
    /// Pending result sets end with [`DriverError::ConnectionClosed`]. Closing
    /// an already closed connection returns [`DriverError::ConnectionClosed`].
    pub async fn close(&self) -> DriverResult<()> {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return Err(DriverError::ConnectionClosed);
            }
            *state = ConnectionState::Closed;
        }

        if let Some(task) = self.read_task.lock().take() {
            task.abort();
        }
        let result = self.transport.close().await;
        fail_pending(&self.pending);
        self.orphans.lock().clear();

        info!(connection_id = self.id, url = %self.url, "connection closed");
        result
    }

    /// Take the result set created for an unsolicited response.
    ///
    /// Only the most recent unsolicited responses are kept; closing the
    /// connection discards them all.
    pub fn take_orphaned(&self, request_id: &Uuid) -> Option<ResultSet> {
        take_orphan(&self.orphans, request_id)
    }

    /// Number of unsolicited result sets held.
    pub fn orphaned_results(&self) -> usize {
        self.orphans.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    #[cfg(test)]
    pub(crate) fn register_pending(&self, count: usize) -> Vec<ResultSet> {
        (0..count)
            .map(|_| {
                let (sender, result_set) = ResultSet::channel(Uuid::new_v4(), 1);
                self.pending.lock().insert(sender.request_id(), sender);
                result_set
            })
            .collect()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .field("active_results", &self.active_results())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.lock().take() {
            task.abort();
        }
    }
}

// ============================================================================
// Read loop
// ============================================================================

struct ReadLoop {
    connection_id: u64,
    transport: Arc<dyn Transport>,
    codec: GraphBinaryMessageCodec,
    state: Arc<Mutex<ConnectionState>>,
    pending: PendingMap,
    orphans: OrphanMap,
    capacity: usize,
}

/// Every transport message carries exactly one response frame. A message
/// that does not decode is dropped whole.
async fn read_loop(mut ctx: ReadLoop) {
    loop {
        match ctx.transport.read().await {
            Ok(Some(frame)) => {
                let mut buffer = BytesMut::from(&frame[..]);
                match ctx.codec.decode_eof(&mut buffer) {
                    Ok(Some(response)) => {
                        if !buffer.is_empty() {
                            warn!(
                                connection_id = ctx.connection_id,
                                trailing = buffer.len(),
                                "ignoring bytes after response frame"
                            );
                        }
                        if let Err(e) = dispatch(response, &ctx.pending, &ctx.orphans, ctx.capacity).await {
                            warn!(connection_id = ctx.connection_id, error = %e, "response dropped");
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(
                            connection_id = ctx.connection_id,
                            size = frame.len(),
                            error = %e,
                            "dropping undecodable message"
                        );
                    }
                }
            }
            Ok(None) => {
                debug!(connection_id = ctx.connection_id, "transport closed by server");
                break;
            }
            Err(e) => {
                warn!(connection_id = ctx.connection_id, error = %e, "transport read failed");
                break;
            }
        }
    }

    // Drain and reset together: a write either registers before this and is
    // failed here, or sees `New` and reconnects.
    let senders = {
        let mut state = ctx.state.lock();
        let senders = take_pending(&ctx.pending);
        if *state == ConnectionState::Established {
            *state = ConnectionState::New;
        }
        senders
    };
    fail_all(senders);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::driver::transport::mock::MockTransport;
    use crate::graphbinary::message::{ResponseResult, ResponseStatus};
    use crate::graphbinary::{Response, Value};

    fn url() -> Url {
        Url::parse("ws://localhost:8182/gremlin").unwrap()
    }

    fn success(request_id: Uuid, data: Value) -> Response {
        Response {
            request_id: Some(request_id),
            status: ResponseStatus {
                code: 200,
                ..Default::default()
            },
            result: ResponseResult {
                data,
                ..Default::default()
            },
        }
    }

    async fn wait_for_state(connection: &Connection, state: ConnectionState) {
        for _ in 0..100 {
            if connection.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("connection never reached {}", state);
    }

    #[tokio::test]
    async fn test_eval_count_end_to_end() {
        let transport = Arc::new(MockTransport::with_responder(Arc::new(|request: &Request| {
            vec![success(request.request_id, Value::Long(0))]
        })));
        let connection = Connection::new(url(), transport.clone(), GraphBinaryMessageCodec::new());
        assert_eq!(connection.state(), ConnectionState::New);

        let request = Request::new("eval", "").with_arg("gremlin", "g.V().count()");
        let mut results = connection.write(&request).await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Established);

        assert_eq!(results.one().await.unwrap(), Some(Value::Long(0)));
        results.close();
        assert_eq!(results.one().await.unwrap(), None);

        let written = transport.written_requests();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].arg("gremlin"), Some(&Value::from("g.V().count()")));
        assert_eq!(connection.active_results(), 0);
    }

    #[tokio::test]
    async fn test_active_results_tracks_pending() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport.clone(), GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        let request = Request::eval("g.V()", "g");
        let _results = connection.write(&request).await.unwrap();
        let _other = connection.write(&Request::eval("g.E()", "g")).await.unwrap();
        assert_eq!(connection.active_results(), 2);

        transport.push_response(&success(request.request_id, Value::Null));
        for _ in 0..100 {
            if connection.active_results() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(connection.active_results(), 1);
    }

    #[tokio::test]
    async fn test_double_close() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport, GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        assert!(connection.close().await.is_ok());
        assert!(matches!(connection.close().await, Err(DriverError::ConnectionClosed)));
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::new(url(), transport, GraphBinaryMessageCodec::new());
        connection.close().await.unwrap();

        let err = connection.write(&Request::eval("g.V()", "g")).await.unwrap_err();
        assert!(matches!(err, DriverError::ConnectionClosed));
        assert_eq!(connection.active_results(), 0);
    }

    #[tokio::test]
    async fn test_close_fails_pending_result_sets() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport, GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        let mut results = connection.write(&Request::eval("g.V()", "g")).await.unwrap();
        connection.close().await.unwrap();
        assert!(matches!(results.one().await, Err(DriverError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_failed_connect() {
        let transport = Arc::new(MockTransport::failing());
        let connection = Connection::new(url(), transport, GraphBinaryMessageCodec::new());

        let err = connection.write(&Request::eval("g.V()", "g")).await.unwrap_err();
        assert!(matches!(err, DriverError::Connection(_)));
        assert_eq!(connection.state(), ConnectionState::New);
        assert_eq!(connection.active_results(), 0);
    }

    #[tokio::test]
    async fn test_server_close_then_reconnect() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport.clone(), GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        let mut results = connection.write(&Request::eval("g.V()", "g")).await.unwrap();
        transport.server_close();
        wait_for_state(&connection, ConnectionState::New).await;
        assert!(matches!(results.one().await, Err(DriverError::ConnectionClosed)));

        let request = Request::eval("g.V()", "g");
        let _results = connection.write(&request).await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Established);
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_garbage_frame_does_not_stop_read_loop() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport.clone(), GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        let request = Request::eval("g.V()", "g");
        let mut results = connection.write(&request).await.unwrap();
        transport.push_raw(bytes::Bytes::from_static(&[0x42, 0x00]));
        transport.push_response(&success(request.request_id, Value::Int(7)));

        assert_eq!(results.one().await.unwrap(), Some(Value::Int(7)));
        assert_eq!(connection.state(), ConnectionState::Established);
    }

    #[tokio::test]
    async fn test_unsolicited_response_is_kept() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport.clone(), GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        let stray = Uuid::new_v4();
        transport.push_response(&success(stray, Value::Int(1)));

        let mut orphan = None;
        for _ in 0..100 {
            orphan = connection.take_orphaned(&stray);
            if orphan.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let orphan = orphan.unwrap();
        assert_eq!(orphan.all().await.unwrap(), vec![Value::Int(1)]);
    }

    #[tokio::test]
    async fn test_truncated_message_does_not_shift_later_frames() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport.clone(), GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        let request = Request::eval("g.V()", "g");
        let mut results = connection.write(&request).await.unwrap();
        transport.push_raw(bytes::Bytes::from_static(&[0x81]));
        transport.push_response(&success(request.request_id, Value::Int(7)));

        let value = tokio::time::timeout(Duration::from_secs(2), results.one())
            .await
            .expect("response was not delivered")
            .unwrap();
        assert_eq!(value, Some(Value::Int(7)));
        assert_eq!(connection.active_results(), 0);
    }

    #[tokio::test]
    async fn test_register_requires_established() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::new(url(), transport, GraphBinaryMessageCodec::new());

        let (sender, _results) = ResultSet::channel(Uuid::new_v4(), 1);
        let err = connection.register(sender.request_id(), sender).unwrap_err();
        assert!(matches!(err, DriverError::ConnectionClosed));
        assert_eq!(connection.active_results(), 0);
    }

    #[tokio::test]
    async fn test_read_loop_exit_fails_requests_registered_before_it() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport.clone(), GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        let mut before = connection.write(&Request::eval("g.V()", "g")).await.unwrap();
        transport.server_close();
        wait_for_state(&connection, ConnectionState::New).await;
        assert!(matches!(before.one().await, Err(DriverError::ConnectionClosed)));

        // a request made after the loop ended survives on the new loop
        let request = Request::eval("g.E()", "g");
        let mut after = connection.write(&request).await.unwrap();
        transport.push_response(&success(request.request_id, Value::Int(3)));
        assert_eq!(after.one().await.unwrap(), Some(Value::Int(3)));
    }

    #[tokio::test]
    async fn test_close_discards_orphans() {
        let transport = Arc::new(MockTransport::new());
        let connection = Connection::open(url(), transport.clone(), GraphBinaryMessageCodec::new(), 16)
            .await
            .unwrap();

        transport.push_response(&success(Uuid::new_v4(), Value::Int(1)));
        for _ in 0..100 {
            if connection.orphaned_results() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(connection.orphaned_results(), 1);

        connection.close().await.unwrap();
        assert_eq!(connection.orphaned_results(), 0);
    }
}
