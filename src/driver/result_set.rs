//! Result sets
//!
//! A [`ResultSet`] is the consumer half of a bounded channel filled by the
//! connection's read loop through a [`ResultSetSender`]. The set ends when
//! every sender is gone: either the request completed or it failed, in which
//! case the error is yielded after the values that arrived before it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::error::{DriverError, DriverResult};
use crate::graphbinary::message::DEFAULT_AGGREGATE_TO;
use crate::graphbinary::{GraphMap, Value};

/// Default number of values buffered per result set
pub const DEFAULT_RESULT_BUFFER_SIZE: usize = 1000;

struct SharedState {
    request_id: Uuid,
    aggregate_to: Mutex<String>,
    status_attributes: Mutex<GraphMap>,
    error: Mutex<Option<DriverError>>,
}

// ============================================================================
// ResultSet - consumer side
// ============================================================================

/// Ordered, closable stream of the values returned for one request.
pub struct ResultSet {
    shared: Arc<SharedState>,
    rx: ReceiverStream<Value>,
    closed: bool,
}

impl ResultSet {
    /// Create a result set and the sender that fills it.
    pub fn channel(request_id: Uuid, capacity: usize) -> (ResultSetSender, ResultSet) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shared = Arc::new(SharedState {
            request_id,
            aggregate_to: Mutex::new(DEFAULT_AGGREGATE_TO.to_string()),
            status_attributes: Mutex::new(GraphMap::new()),
            error: Mutex::new(None),
        });

        let sender = ResultSetSender {
            shared: Arc::clone(&shared),
            tx,
            orphaned: false,
        };
        let result_set = ResultSet {
            shared,
            rx: ReceiverStream::new(rx),
            closed: false,
        };
        (sender, result_set)
    }

    /// Id of the request this set answers.
    pub fn request_id(&self) -> Uuid {
        self.shared.request_id
    }

    /// Next value, waiting until one arrives.
    ///
    /// `Ok(None)` marks the end of the set. A request that failed yields its
    /// error once after the values received before the failure.
    pub async fn one(&mut self) -> DriverResult<Option<Value>> {
        self.next().await.transpose()
    }

    /// Drain the set into a vector.
    pub async fn all(mut self) -> DriverResult<Vec<Value>> {
        let mut values = Vec::new();
        while let Some(value) = self.one().await? {
            values.push(value);
        }
        Ok(values)
    }

    /// Whether no value is buffered right now.
    pub fn is_empty(&self) -> bool {
        self.rx.as_ref().is_empty()
    }

    /// Close the set. Buffered values are discarded and nothing more is
    /// appended. Closing twice is a no-op.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.rx.close();
        }
    }

    /// Whether [`ResultSet::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// How partial results should be combined (`meta["aggregateTo"]`).
    pub fn aggregate_to(&self) -> String {
        self.shared.aggregate_to.lock().clone()
    }

    /// Override the aggregation hint.
    pub fn set_aggregate_to(&self, aggregate_to: impl Into<String>) {
        *self.shared.aggregate_to.lock() = aggregate_to.into();
    }

    /// Status attributes of the final response.
    pub fn status_attributes(&self) -> GraphMap {
        self.shared.status_attributes.lock().clone()
    }

    /// Replace the status attributes.
    pub fn set_status_attributes(&self, attributes: GraphMap) {
        *self.shared.status_attributes.lock() = attributes;
    }
}

impl Stream for ResultSet {
    type Item = DriverResult<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.closed {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.rx).poll_next(cx) {
            Poll::Ready(Some(value)) => Poll::Ready(Some(Ok(value))),
            Poll::Ready(None) => Poll::Ready(self.shared.error.lock().take().map(Err)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("request_id", &self.shared.request_id)
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// ResultSetSender - producer side
// ============================================================================

/// Producer half of a [`ResultSet`].
#[derive(Clone)]
pub struct ResultSetSender {
    shared: Arc<SharedState>,
    tx: mpsc::Sender<Value>,
    orphaned: bool,
}

impl ResultSetSender {
    /// Id of the request this sender fills.
    pub fn request_id(&self) -> Uuid {
        self.shared.request_id
    }

    /// Mark this sender as filling a set nobody asked for. Orphaned sets never
    /// apply backpressure: values that do not fit are dropped.
    pub(crate) fn orphaned(mut self) -> Self {
        self.orphaned = true;
        self
    }

    /// Append a value, waiting while the buffer is full.
    ///
    /// Values sent after the consumer closed or dropped the set are discarded.
    pub async fn add_result(&self, value: Value) {
        if self.orphaned {
            if self.tx.try_send(value).is_err() {
                tracing::warn!(request_id = %self.shared.request_id, "dropping value for orphaned result set");
            }
            return;
        }
        if self.tx.send(value).await.is_err() {
            tracing::trace!(request_id = %self.shared.request_id, "result set closed by consumer");
        }
    }

    /// Set the aggregation hint.
    pub fn set_aggregate_to(&self, aggregate_to: impl Into<String>) {
        *self.shared.aggregate_to.lock() = aggregate_to.into();
    }

    /// Set the status attributes.
    pub fn set_status_attributes(&self, attributes: GraphMap) {
        *self.shared.status_attributes.lock() = attributes;
    }

    /// Whether the consumer closed or dropped the set.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Finish the set successfully.
    pub fn complete(self) {
        drop(self);
    }

    /// Finish the set with an error.
    pub fn fail(self, error: DriverError) {
        let mut slot = self.shared.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }
}

impl std::fmt::Debug for ResultSetSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSetSender")
            .field("request_id", &self.shared.request_id)
            .field("orphaned", &self.orphaned)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
