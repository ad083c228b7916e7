use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::mutex::Mutex;
use crate::notifier::{EventNotifier, READABLE, WRITABLE};
use crate::registry::{ByteRegistry, Direction, SocketId};
use crate::stack::{ConnectProgress, NetworkStack, SocketError, SocketHandle};

/// A blocking adapter around one [`NetworkStack`] connection
///
/// All methods take `&self` and are safe to call from multiple threads, with
/// one restriction: at most one thread may be in the send path (`connect` or
/// `send`) and at most one in the receive path (`recv`) at a time.
/// Overlapping calls on the same direction are a caller contract violation
/// and panic; send and receive in parallel is the supported concurrent case.
///
/// The internal lock is held for every state inspection and mutation and
/// released across every wait, so [`event`](Self::event) and
/// [`close`](Self::close) remain callable from other threads while an
/// operation is parked.
///
/// Timeouts are configured per socket with [`set_timeout`](Self::set_timeout):
/// `None` waits indefinitely (the default), `Some(Duration::ZERO)` makes all
/// operations non-blocking, and any other duration bounds each blocking call.
pub struct Socket {
    stack: Arc<dyn NetworkStack>,
    state: Mutex<State>,
    notifier: EventNotifier,
    registry: Arc<ByteRegistry>,
    id: SocketId,
}

struct State {
    handle: Option<SocketHandle>,
    timeout: Option<Duration>,
    /// Readiness notifications since the last reset; reset only by the
    /// operation about to wait on them, incremented only by `event`
    pending: u64,
    read_in_progress: bool,
    write_in_progress: bool,
    callback: Option<Box<dyn FnMut() + Send>>,
}

impl Socket {
    /// Create an unbound socket with its own private byte registry
    pub fn new(stack: Arc<dyn NetworkStack>) -> Self {
        Self::with_registry(stack, Arc::new(ByteRegistry::new()))
    }

    /// Create an unbound socket whose transfers are recorded in `registry`
    pub fn with_registry(stack: Arc<dyn NetworkStack>, registry: Arc<ByteRegistry>) -> Self {
        Self {
            stack,
            state: Mutex::new(State {
                handle: None,
                timeout: None,
                pending: 0,
                read_in_progress: false,
                write_in_progress: false,
                callback: None,
            }),
            notifier: EventNotifier::new(),
            registry,
            id: SocketId::next(),
        }
    }

    /// This socket's byte accounting identity
    pub fn id(&self) -> SocketId {
        self.id
    }

    /// The registry this socket records transfers in
    pub fn registry(&self) -> &Arc<ByteRegistry> {
        &self.registry
    }

    /// Bind a stack-owned handle to this socket, replacing any previous one
    ///
    /// Used for accept-style assignment; `connect` requires a handle to have
    /// been attached first.
    pub fn attach(&self, handle: SocketHandle) {
        self.state.lock("attach").handle = Some(handle);
    }

    /// Set the maximum wait per blocking call
    ///
    /// `None` waits indefinitely, `Some(Duration::ZERO)` switches the socket
    /// to non-blocking mode, anything else bounds each wait.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.state.lock("set_timeout").timeout = timeout;
    }

    /// Register a callback invoked when readiness transitions from "none
    /// pending" to "some pending"
    ///
    /// The callback runs on the thread calling [`event`](Self::event), with
    /// the socket's state lock held; it must not call back into this socket.
    /// It fires exactly once per transition: further notifications before
    /// the next operation resets the pending count do not re-invoke it.
    pub fn set_callback(&self, callback: impl FnMut() + Send + 'static) {
        self.state.lock("set_callback").callback = Some(Box::new(callback));
    }

    /// Remove any registered readiness callback
    pub fn clear_callback(&self) {
        self.state.lock("clear_callback").callback = None;
    }

    /// Establish a connection to `addr`
    ///
    /// Retries while the stack reports establishment in progress, waiting on
    /// write readiness between attempts, up to the configured timeout. In
    /// non-blocking mode the raw [`SocketError::InProgress`] and
    /// [`SocketError::AlreadyConnected`] outcomes are surfaced for the caller
    /// to poll on; a blocking caller only ever sees success, a hard error, or
    /// [`SocketError::WouldBlock`] after the timeout.
    ///
    /// # Panics
    ///
    /// If another connect or send is in flight on this socket (connect shares
    /// the write direction).
    pub fn connect(&self, addr: SocketAddr) -> Result<(), SocketError> {
        let mut state = self.state.lock("connect");
        assert!(
            !state.write_in_progress,
            "connect or send already in flight on this socket"
        );
        state.write_in_progress = true;

        let mut waited = false;
        let result = loop {
            let Some(handle) = state.handle else {
                break Err(SocketError::NoSocket);
            };
            state.pending = 0;
            let result = self.stack.connect(handle, addr);
            let establishing = matches!(
                result,
                Ok(ConnectProgress::InProgress | ConnectProgress::Already)
            );
            let timeout = state.timeout;
            if timeout == Some(Duration::ZERO) || !establishing {
                break result;
            }
            waited = true;
            trace!("connect in progress; waiting for writability");
            // Release the lock before parking so other threads can use the
            // socket and the notification path can run
            drop(state);
            let woken = self.notifier.wait_any(WRITABLE, timeout);
            state = self.state.lock("connect");
            if woken.is_none() {
                break result;
            }
        };
        state.write_in_progress = false;
        drop(state);

        match result {
            Ok(ConnectProgress::Done) => Ok(()),
            // The stack reports idempotent success with a distinct code only
            // meaningful to polling callers; whoever blocked here connected
            // during this call.
            Ok(ConnectProgress::IsConnected) if waited => Ok(()),
            Ok(ConnectProgress::IsConnected) => Err(SocketError::AlreadyConnected),
            Ok(ConnectProgress::InProgress | ConnectProgress::Already) if waited => {
                Err(SocketError::WouldBlock)
            }
            Ok(ConnectProgress::InProgress | ConnectProgress::Already) => {
                Err(SocketError::InProgress)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve `host` through the stack and connect to it on `port`
    ///
    /// Any resolution failure is reported as [`SocketError::DnsFailure`].
    pub fn connect_host(&self, host: &str, port: u16) -> Result<(), SocketError> {
        let ip = self
            .stack
            .resolve(host)
            .map_err(|_| SocketError::DnsFailure)?;
        self.connect(SocketAddr::new(ip, port))
    }

    /// Send `data`, returning how many bytes the stack accepted
    ///
    /// A blocking send writes the whole buffer: partial acceptance is retried
    /// internally, waiting on write readiness whenever the stack would block,
    /// because without signal interruption a willing blocking caller can
    /// always eventually write everything unless the connection breaks. The
    /// returned count can still fall short of `data.len()` when the timeout
    /// elapses or the socket is non-blocking; callers must compare it against
    /// the requested length.
    ///
    /// # Panics
    ///
    /// If another connect or send is in flight on this socket.
    pub fn send(&self, data: &[u8]) -> Result<usize, SocketError> {
        let mut state = self.state.lock("send");
        assert!(
            !state.write_in_progress,
            "two sends in flight on one socket"
        );
        state.write_in_progress = true;

        let mut written = 0;
        let result = loop {
            let Some(handle) = state.handle else {
                break Err(SocketError::NoSocket);
            };
            state.pending = 0;
            let result = self.stack.send(handle, &data[written..]);
            if let Ok(n) = result {
                written += n;
                if written >= data.len() {
                    break result;
                }
            }
            let timeout = state.timeout;
            if timeout == Some(Duration::ZERO) {
                break result;
            }
            match result {
                // Partial progress; try the remainder immediately
                Ok(_) => {}
                Err(SocketError::WouldBlock) => {
                    drop(state);
                    let woken = self.notifier.wait_any(WRITABLE, timeout);
                    state = self.state.lock("send");
                    if woken.is_none() {
                        trace!(written, "send timed out");
                        break result;
                    }
                }
                Err(_) => break result,
            }
        };
        state.write_in_progress = false;
        drop(state);

        match result {
            Err(e) if e != SocketError::WouldBlock => Err(e),
            _ if written == 0 => Err(SocketError::WouldBlock),
            _ => {
                self.registry.record(self.id, Direction::Send, written as u64);
                Ok(written)
            }
        }
    }

    /// Receive into `buf`, returning how many bytes were transferred
    ///
    /// Unlike [`send`](Self::send), a partial result is a normal outcome and
    /// is returned immediately; receive never loops to fill the buffer. The
    /// wait-and-retry path only runs while the stack reports it would block.
    ///
    /// # Panics
    ///
    /// If another recv is in flight on this socket.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, SocketError> {
        let mut state = self.state.lock("recv");
        assert!(
            !state.read_in_progress,
            "two recvs in flight on one socket"
        );
        state.read_in_progress = true;

        let result = loop {
            let Some(handle) = state.handle else {
                break Err(SocketError::NoSocket);
            };
            state.pending = 0;
            let result = self.stack.recv(handle, buf);
            let timeout = state.timeout;
            if timeout == Some(Duration::ZERO)
                || !matches!(result, Err(SocketError::WouldBlock))
            {
                if let Ok(n) = result {
                    if n > 0 {
                        self.registry.record(self.id, Direction::Recv, n as u64);
                    }
                }
                break result;
            }
            drop(state);
            let woken = self.notifier.wait_any(READABLE, timeout);
            state = self.state.lock("recv");
            if woken.is_none() {
                break Err(SocketError::WouldBlock);
            }
        };
        state.read_in_progress = false;

        result
    }

    /// Deliver a readiness notification from the stack's asynchronous layer
    ///
    /// Called whenever the underlying handle becomes readable or writable;
    /// the stack does not say which, so both conditions are signaled and a
    /// parked operation selects by the flag it waited on. Increments the
    /// pending count and, on the idle-to-pending transition only, invokes the
    /// registered callback.
    pub fn event(&self) {
        self.notifier.set(READABLE | WRITABLE);

        let mut state = self.state.lock("event");
        state.pending += 1;
        if state.pending == 1 {
            trace!("readiness pending");
            if let Some(callback) = state.callback.as_mut() {
                callback();
            }
        }
    }

    /// Detach the handle, failing all further operations with
    /// [`SocketError::NoSocket`]
    ///
    /// Safe to call from another thread while an operation is blocked: parked
    /// waiters are woken and observe the missing handle. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock("close");
        if state.handle.take().is_some() {
            debug!(id = ?self.id, "socket closed");
        }
        drop(state);
        // Wake parked operations so they re-check the handle
        self.notifier.set(READABLE | WRITABLE);
    }

    /// Bytes the stack has accepted from this socket
    pub fn bytes_sent(&self) -> u64 {
        self.registry.bytes_sent(self.id)
    }

    /// Bytes the stack has delivered to this socket
    pub fn bytes_received(&self) -> u64 {
        self.registry.bytes_received(self.id)
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> u64 {
        self.state.lock("pending").pending
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
        self.registry.remove(self.id);
    }
}

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
