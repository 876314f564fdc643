//! Response routing
//!
//! Routes each decoded response to the result set of the request it answers
//! and applies the status code rules.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{DriverError, DriverResult};
use super::result_set::{ResultSet, ResultSetSender};
use crate::graphbinary::message::{
    Response, STATUS_AUTHENTICATE, STATUS_NO_CONTENT, STATUS_PARTIAL_CONTENT, STATUS_SUCCESS,
};
use crate::graphbinary::Value;

/// In-flight requests by id
pub(crate) type PendingMap = Arc<Mutex<HashMap<Uuid, ResultSetSender>>>;

/// Result sets created for responses that matched no pending request,
/// oldest first
pub(crate) type OrphanMap = Arc<Mutex<VecDeque<ResultSet>>>;

/// Orphaned result sets kept per connection; older ones are discarded
pub(crate) const MAX_ORPHANED_RESULTS: usize = 32;

/// Route one response.
///
/// Terminal codes remove the pending entry; `206` keeps it. A response whose
/// id matches no pending request gets a fresh orphan result set so its data
/// is not silently lost. A response without a request id cannot be routed
/// and is a protocol error.
pub(crate) async fn dispatch(
    response: Response,
    pending: &PendingMap,
    orphans: &OrphanMap,
    capacity: usize,
) -> DriverResult<()> {
    let Some(request_id) = response.request_id else {
        return Err(DriverError::protocol(format!(
            "response with status {} has no request id",
            response.status.code
        )));
    };
    let code = response.status.code;
    let partial = code == STATUS_PARTIAL_CONTENT;

    let sender = {
        let mut pending = pending.lock();
        if partial {
            pending.get(&request_id).cloned()
        } else {
            pending.remove(&request_id)
        }
    };
    let sender = match sender {
        Some(sender) => sender,
        None => {
            warn!(request_id = %request_id, code, "response for unknown request");
            let (sender, result_set) = ResultSet::channel(request_id, capacity);
            let sender = sender.orphaned();
            keep_orphan(orphans, result_set);
            if partial {
                pending.lock().insert(request_id, sender.clone());
            }
            sender
        }
    };

    sender.set_aggregate_to(response.aggregate_to());

    match code {
        STATUS_AUTHENTICATE => {
            sender.fail(DriverError::AuthenticationUnsupported);
        }
        STATUS_NO_CONTENT => {
            sender.add_result(Value::List(Vec::new())).await;
            sender.complete();
        }
        STATUS_SUCCESS => {
            sender.set_status_attributes(response.status.attributes);
            sender.add_result(response.result.data).await;
            sender.complete();
        }
        STATUS_PARTIAL_CONTENT => {
            sender.add_result(response.result.data).await;
        }
        _ => {
            let message = response.status.message.unwrap_or_default();
            debug!(request_id = %request_id, code, message = %message, "request failed");
            sender.fail(DriverError::status(code, message));
        }
    }
    Ok(())
}

fn keep_orphan(orphans: &OrphanMap, result_set: ResultSet) {
    let mut orphans = orphans.lock();
    while orphans.len() >= MAX_ORPHANED_RESULTS {
        if let Some(evicted) = orphans.pop_front() {
            debug!(request_id = %evicted.request_id(), "discarding oldest orphaned result set");
        }
    }
    orphans.push_back(result_set);
}

/// Remove the orphaned result set for `request_id`.
pub(crate) fn take_orphan(orphans: &OrphanMap, request_id: &Uuid) -> Option<ResultSet> {
    let mut orphans = orphans.lock();
    let index = orphans.iter().position(|r| r.request_id() == *request_id)?;
    orphans.remove(index)
}

/// Remove every pending sender.
pub(crate) fn take_pending(pending: &PendingMap) -> Vec<ResultSetSender> {
    pending.lock().drain().map(|(_, sender)| sender).collect()
}

/// End `senders` with [`DriverError::ConnectionClosed`].
pub(crate) fn fail_all(senders: Vec<ResultSetSender>) {
    if !senders.is_empty() {
        debug!(count = senders.len(), "failing pending result sets");
    }
    for sender in senders {
        sender.fail(DriverError::ConnectionClosed);
    }
}

/// Fail every pending result set with [`DriverError::ConnectionClosed`].
pub(crate) fn fail_pending(pending: &PendingMap) {
    fail_all(take_pending(pending));
}
