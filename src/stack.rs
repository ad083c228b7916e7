use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

/// Opaque identifier for a transport-layer socket owned by a [`NetworkStack`]
///
/// Handles are allocated and invalidated by the stack; this crate only stores
/// and forwards them. Identity is the only operation they support.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SocketHandle(u64);

impl SocketHandle {
    /// Construct a handle from a stack-assigned identifier
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The stack-assigned identifier
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Outcome of a single non-blocking connect attempt
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectProgress {
    /// The connection was established by this call
    Done,
    /// Establishment has started and will complete asynchronously
    InProgress,
    /// A previous establishment attempt is still running
    Already,
    /// The handle was connected before this call was made
    ///
    /// Stacks report idempotent success with this distinct code; it is only
    /// meaningful to callers polling in non-blocking mode. A caller who
    /// blocked for the connection sees plain success instead.
    IsConnected,
}

/// Errors surfaced by socket operations
///
/// Transient would-block conditions are retried internally up to the
/// configured timeout and only then surfaced; every other stack error
/// propagates immediately without retry.
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum SocketError {
    /// Operation attempted on a closed or unbound socket
    #[error("no socket bound")]
    NoSocket,
    /// No progress was possible within the allotted wait
    ///
    /// Also the result of any operation in non-blocking mode (zero timeout)
    /// when the stack cannot make immediate progress.
    #[error("operation would block")]
    WouldBlock,
    /// Connection establishment has started but not finished
    ///
    /// Only returned from a non-blocking connect; blocking callers retry on
    /// this condition internally and report [`SocketError::WouldBlock`] if
    /// the timeout elapses first.
    #[error("connect in progress")]
    InProgress,
    /// The socket was already connected before the call
    ///
    /// Only returned from a non-blocking connect; a caller who blocked for
    /// the connection is considered to have connected during that call and
    /// sees success instead.
    #[error("already connected")]
    AlreadyConnected,
    /// Name resolution failed
    #[error("DNS resolution failed")]
    DnsFailure,
    /// Transport-reported error, forwarded unchanged from the stack
    #[error("stack error {0}")]
    Stack(i32),
}

/// Non-blocking interface to a transport-layer network stack
///
/// Every operation returns immediately. When no progress is possible the
/// stack reports [`SocketError::WouldBlock`] (or an in-progress
/// [`ConnectProgress`]) instead of blocking, and is expected to deliver a
/// readiness notification to [`Socket::event`](crate::Socket::event) once
/// the handle can make progress again.
///
/// Implementations are shared between caller threads and the stack's own
/// asynchronous layer, so they must be `Send + Sync`.
pub trait NetworkStack: Send + Sync {
    /// Begin or continue connecting `handle` to `addr`
    fn connect(&self, handle: SocketHandle, addr: SocketAddr)
        -> Result<ConnectProgress, SocketError>;

    /// Write bytes from `data`, returning how many the stack accepted
    fn send(&self, handle: SocketHandle, data: &[u8]) -> Result<usize, SocketError>;

    /// Read bytes into `buf`, returning how many were transferred
    fn recv(&self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize, SocketError>;

    /// Resolve `host` to an address
    fn resolve(&self, host: &str) -> Result<IpAddr, SocketError>;
}
