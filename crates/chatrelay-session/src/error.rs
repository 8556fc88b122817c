//! Error types for the session layer.

use chatrelay_transport::{ConnectionId, TransportError};

/// Errors that can occur while reading from or delivering to a session.
///
/// None of these ever leave the session that produced them: a read error
/// ends that connection, a delivery error drops one line for one client.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session's writer has stopped; nothing more can be delivered.
    #[error("session {0} is closed")]
    Closed(ConnectionId),

    /// The outbound queue stayed full for the whole delivery timeout.
    #[error("delivery to {0} timed out")]
    DeliveryTimedOut(ConnectionId),

    /// No line arrived within the read timeout.
    #[error("no input from {0} within the read timeout")]
    ReadTimedOut(ConnectionId),

    /// The underlying connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
