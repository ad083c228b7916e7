use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// The handle has data to read
pub(crate) const READABLE: u8 = 0b01;
/// The handle can accept more data
pub(crate) const WRITABLE: u8 = 0b10;

/// Parks a thread until one of a set of readiness flags is raised or a
/// deadline passes
///
/// `set` may be called from any thread, including while a waiter is parked
/// and including before the wait begins; flags stay raised until a wait
/// consumes them, so a notification delivered between a stack poll and the
/// subsequent wait is not lost.
#[derive(Debug, Default)]
pub(crate) struct EventNotifier {
    flags: Mutex<u8>,
    cond: Condvar,
}

impl EventNotifier {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Raise `mask` and wake all waiters
    pub(crate) fn set(&self, mask: u8) {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        *flags |= mask;
        self.cond.notify_all();
    }

    /// Wait until any flag in `mask` is raised, consuming the matched flags
    ///
    /// A `timeout` of `None` waits indefinitely; `Some(Duration::ZERO)`
    /// polls. Returns the matched flags, or `None` if the deadline passed
    /// without a match. Spurious condvar wakeups are absorbed here; callers
    /// still re-check actual stack state after a successful wait.
    pub(crate) fn wait_any(&self, mask: u8, timeout: Option<Duration>) -> Option<u8> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let matched = *flags & mask;
            if matched != 0 {
                *flags &= !matched;
                return Some(matched);
            }
            match deadline {
                None => {
                    flags = self
                        .cond
                        .wait(flags)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    flags = self
                        .cond
                        .wait_timeout(flags, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}
