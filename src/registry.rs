use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rustc_hash::FxHashMap;

/// Process-unique identity of a [`Socket`](crate::Socket)
///
/// Used as the key for byte accounting; never reused within a process, so a
/// registry entry can only ever describe one socket.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SocketId(u64);

impl SocketId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Transfer direction for byte accounting
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Direction {
    Send,
    Recv,
}

#[derive(Debug, Default, Copy, Clone)]
struct Totals {
    sent: u64,
    received: u64,
}

/// Cumulative bytes sent and received per live socket
///
/// A diagnostic aggregate. An entry is created on a socket's first
/// successful transfer and removed when the socket is dropped; totals count
/// bytes the stack actually accepted or delivered, never bytes requested.
/// All access goes through the registry's own lock, which is never held
/// across a blocking wait.
#[derive(Debug, Default)]
pub struct ByteRegistry {
    totals: Mutex<FxHashMap<SocketId, Totals>>,
}

impl ByteRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, id: SocketId, direction: Direction, count: u64) {
        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = totals.entry(id).or_default();
        match direction {
            Direction::Send => entry.sent += count,
            Direction::Recv => entry.received += count,
        }
    }

    pub(crate) fn remove(&self, id: SocketId) {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    /// Bytes the stack has accepted from `id`, or 0 if it has no entry
    pub fn bytes_sent(&self, id: SocketId) -> u64 {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map_or(0, |t| t.sent)
    }

    /// Bytes the stack has delivered to `id`, or 0 if it has no entry
    pub fn bytes_received(&self, id: SocketId) -> u64 {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map_or(0, |t| t.received)
    }

    /// Sum of bytes sent across every tracked socket
    pub fn total_sent(&self) -> u64 {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|t| t.sent)
            .sum()
    }

    /// Sum of bytes received across every tracked socket
    pub fn total_received(&self) -> u64 {
        self.totals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|t| t.received)
            .sum()
    }
}
