//! Request/response correlation.
//!
//! Every in-flight call owns a table entry keyed by its request id.
//! Presence in the table is the single source of truth for whether a call
//! is still pending: the frame-dispatch path and the timeout path both
//! remove-then-act under the table lock, so each call resolves exactly
//! once no matter which side wins the race.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;
use vicebridge_wire::{status, Frame, PeerStatus, WireFormat};

use crate::error::ClientError;

pub(crate) type CallResult = Result<Frame, ClientError>;

/// Receiver half handed to the caller of a registered call.
#[derive(Debug)]
pub(crate) struct Ticket {
    pub id: u32,
    pub rx: mpsc::Receiver<CallResult>,
}

struct PendingCall {
    /// Response kind that may claim this call when the peer answers
    /// out-of-band with the async sentinel id instead of our id.
    expected_kind: Option<u8>,
    /// Registration order, for FIFO async-kind matching.
    seq: u64,
    tx: mpsc::Sender<CallResult>,
}

struct Inner {
    next_id: u32,
    next_seq: u64,
    calls: HashMap<u32, PendingCall>,
}

pub(crate) struct Correlator {
    max_id: u32,
    sentinel: u32,
    inner: Mutex<Inner>,
}

impl Correlator {
    pub fn new(format: &WireFormat) -> Self {
        Self {
            max_id: format.id_width.max_id(),
            sentinel: format.async_request_id,
            inner: Mutex::new(Inner {
                next_id: 0,
                next_seq: 0,
                calls: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id and register a pending call under it.
    ///
    /// Refuses ids that collide with a live call: the id space wraps, and
    /// two live calls sharing an id would make responses ambiguous.
    pub fn register(&self, expected_kind: Option<u8>) -> Result<Ticket, ClientError> {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.lock();

        let usable = self.max_id as u64 + if self.sentinel <= self.max_id { 0 } else { 1 };
        if inner.calls.len() as u64 >= usable {
            return Err(ClientError::IdSpaceExhausted);
        }
        let id = loop {
            let candidate = inner.next_id;
            inner.next_id = if candidate == self.max_id {
                0
            } else {
                candidate + 1
            };
            if candidate == self.sentinel {
                continue;
            }
            if !inner.calls.contains_key(&candidate) {
                break candidate;
            }
        };

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.calls.insert(
            id,
            PendingCall {
                expected_kind,
                seq,
                tx,
            },
        );
        Ok(Ticket { id, rx })
    }

    /// Route an incoming frame to the pending call it answers.
    ///
    /// Returns the frame back when no call claims it, so the connection
    /// can log the drop; an unclaimed frame is a legitimate unsolicited
    /// event, not an error.
    pub fn dispatch(&self, frame: Frame) -> Option<Frame> {
        let mut inner = self.lock();

        let id = if frame.request_id == self.sentinel {
            // Out-of-band reply: oldest pending call expecting this kind.
            match inner
                .calls
                .iter()
                .filter(|(_, call)| call.expected_kind == Some(frame.kind))
                .min_by_key(|(_, call)| call.seq)
                .map(|(&id, _)| id)
            {
                Some(id) => id,
                None => return Some(frame),
            }
        } else if inner.calls.contains_key(&frame.request_id) {
            frame.request_id
        } else {
            return Some(frame);
        };

        if let Some(call) = inner.calls.remove(&id) {
            let result = if frame.status == status::OK {
                Ok(frame)
            } else {
                Err(ClientError::Peer(PeerStatus(frame.status)))
            };
            // Sent while the lock is held: a timed-out caller that finds
            // its entry gone can immediately try_recv the result.
            let _ = call.tx.send(result);
        }
        None
    }

    /// Timeout path: remove the entry if it is still pending.
    ///
    /// Returns true when the entry was present, meaning the timeout won
    /// and no response will ever be delivered for this call.
    pub fn take(&self, id: u32) -> bool {
        self.lock().calls.remove(&id).is_some()
    }

    /// Reject every pending call with a connection-closed error.
    pub fn fail_all(&self) {
        let mut inner = self.lock();
        let count = inner.calls.len();
        if count > 0 {
            trace!(count, "failing all pending calls");
        }
        for (_, call) in inner.calls.drain() {
            let _ = call.tx.send(Err(ClientError::ConnectionClosed));
        }
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.lock().calls.len()
    }
}
