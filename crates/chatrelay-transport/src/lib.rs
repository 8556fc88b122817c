//! Transport abstraction layer for chatrelay.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! the stream a client talks on. Whatever the underlying protocol, a
//! connection moves whole text lines: framing is the transport's job, so
//! the layers above never see partial reads.
//!
//! # Feature Flags
//!
//! - `tcp` (default) — newline-delimited TCP via `tokio-util`'s `LinesCodec`
//! - `websocket` — one line per WebSocket frame via `tokio-tungstenite`

mod error;
#[cfg(feature = "tcp")]
mod tcp;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{TcpLineConnection, TcpLineTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketLineConnection, WebSocketLineTransport};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bound on a single inbound line, in bytes, unless the transport
/// is configured otherwise.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// Counter for generating unique connection IDs, shared by every
/// transport in the process.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[cfg_attr(not(any(feature = "tcp", feature = "websocket")), allow(dead_code))]
pub(crate) fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;

    /// Returns the local address the listener is bound to.
    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr>;

    /// Gracefully shuts down the transport, stopping new connections.
    fn shutdown(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A single connection that sends and receives text lines.
///
/// All methods take `&self` so one task can block in [`recv`](Self::recv)
/// while another writes through [`send`](Self::send). Implementations
/// lock their read and write halves independently.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one line to the remote peer. The line terminator is added
    /// by the transport.
    fn send(
        &self,
        line: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next line from the remote peer, without its
    /// terminator.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
