//! Blocking socket adapter for event-notified network stacks
//!
//! Many network stacks expose a purely non-blocking interface: every call
//! returns immediately, reporting "would block" when no progress is possible,
//! and readiness is delivered later as an asynchronous notification from
//! another thread or interrupt context. This crate layers a thread-safe,
//! timeout-bounded, synchronous-looking connection API on top of such a
//! stack.
//!
//! The entry point is [`Socket`]. A `Socket` owns one connection's mutable
//! state behind a lock and drives retry loops for `connect`, `send`, and
//! `recv`: whenever the underlying [`NetworkStack`] reports that it would
//! block, the lock is released and the calling thread parks on an internal
//! notifier until the stack's asynchronous layer delivers a readiness
//! notification via [`Socket::event`] or the configured timeout elapses.
//!
//! The stack itself is a collaborator consumed through the [`NetworkStack`]
//! trait; this crate implements no transport protocol, no name resolution,
//! and no I/O of its own.
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![warn(clippy::use_self)]

mod mutex;
mod notifier;
mod registry;
mod socket;
mod stack;

pub use crate::registry::{ByteRegistry, SocketId};
pub use crate::socket::Socket;
pub use crate::stack::{ConnectProgress, NetworkStack, SocketError, SocketHandle};
