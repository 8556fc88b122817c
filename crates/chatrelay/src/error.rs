//! Unified error type for chatrelay.

use chatrelay_protocol::ProtocolError;
use chatrelay_room::RoomError;
use chatrelay_session::SessionError;
use chatrelay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `chatrelay` crate, you deal with this single error type
/// instead of importing errors from each layer. The `#[from]` attribute on
/// each variant lets `?` convert layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ChatRelayError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A line that could not be parsed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (closed, timed out).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (snapshot persistence).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use chatrelay_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Transport(_)));
        assert!(relay_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::Malformed { fields: 2 };
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::ReadTimedOut(ConnectionId::new(3));
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Session(_)));
        assert!(relay_err.to_string().contains("conn-3"));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::SnapshotIo {
            path: "rooms.json".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let relay_err: ChatRelayError = err.into();
        assert!(matches!(relay_err, ChatRelayError::Room(_)));
    }
}
