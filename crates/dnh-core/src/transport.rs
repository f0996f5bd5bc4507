// ── Connection table ──
//
// Transport-owned map from opaque connection ids to bounded outbound
// queues. The core never touches sockets; it only hands serialized
// payloads to an `Outbound` implementation.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::SendError;

/// Default per-connection outbound queue depth.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// A serialized message shared across every recipient of a broadcast.
pub type Payload = Arc<str>;

/// Opaque handle for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Delivery seam between the core and the transport.
///
/// Sends must complete in bounded time; a slow or closed recipient
/// fails only its own delivery.
pub trait Outbound: Send + Sync {
    fn send(&self, to: ConnectionId, payload: &Payload) -> Result<(), SendError>;

    /// Every connection currently open, registered or not.
    fn open_connections(&self) -> Vec<ConnectionId>;
}

// ── ConnectionTable ──────────────────────────────────────────────────

/// Concurrent table of open connections and their outbound queues.
pub struct ConnectionTable {
    senders: DashMap<ConnectionId, mpsc::Sender<Payload>>,
    next_id: AtomicU64,
    queue_depth: usize,
}

impl ConnectionTable {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            senders: DashMap::new(),
            next_id: AtomicU64::new(1),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Allocate an id and its outbound queue. The transport drains the
    /// receiver into the socket.
    pub fn open(&self) -> (ConnectionId, mpsc::Receiver<Payload>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.senders.insert(id, tx);
        (id, rx)
    }

    /// Drop the outbound queue. Returns `false` if already closed.
    pub fn close(&self, id: ConnectionId) -> bool {
        self.senders.remove(&id).is_some()
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.senders.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_QUEUE)
    }
}

impl Outbound for ConnectionTable {
    fn send(&self, to: ConnectionId, payload: &Payload) -> Result<(), SendError> {
        let Some(tx) = self.senders.get(&to) else {
            return Err(SendError::Unknown(to));
        };
        tx.try_send(Arc::clone(payload)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full(to),
            mpsc::error::TrySendError::Closed(_) => SendError::Closed(to),
        })
    }

    fn open_connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.senders.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payload(s: &str) -> Payload {
        Arc::from(s)
    }

    #[test]
    fn ids_are_unique() {
        let table = ConnectionTable::default();
        let (a, _ra) = table.open();
        let (b, _rb) = table.open();
        assert_ne!(a, b);
        assert_eq!(table.open_connections(), vec![a, b]);
    }

    #[test]
    fn send_reaches_receiver() {
        let table = ConnectionTable::default();
        let (id, mut rx) = table.open();
        table.send(id, &payload("hello")).unwrap();
        assert_eq!(&*rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn full_queue_fails_only_that_send() {
        let table = ConnectionTable::new(1);
        let (slow, _keep) = table.open();
        let (fast, mut fast_rx) = table.open();
        table.send(slow, &payload("1")).unwrap();
        assert_eq!(table.send(slow, &payload("2")), Err(SendError::Full(slow)));
        table.send(fast, &payload("3")).unwrap();
        assert_eq!(&*fast_rx.try_recv().unwrap(), "3");
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let table = ConnectionTable::default();
        let (id, rx) = table.open();
        drop(rx);
        assert_eq!(table.send(id, &payload("x")), Err(SendError::Closed(id)));
    }

    #[test]
    fn close_is_idempotent() {
        let table = ConnectionTable::default();
        let (id, _rx) = table.open();
        assert!(table.close(id));
        assert!(!table.close(id));
        assert_eq!(table.send(id, &payload("x")), Err(SendError::Unknown(id)));
        assert!(table.is_empty());
    }
}
