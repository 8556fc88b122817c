//! In-memory connection for dispatcher and supervisor tests.

use chatrelay_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::{Mutex, mpsc};

pub(crate) type Feed = mpsc::UnboundedSender<Result<Option<String>, TransportError>>;

/// `feed` drives recv(); everything sent lands in the returned receiver.
/// Dropping the feed ends the stream cleanly.
pub(crate) struct FakeConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Result<Option<String>, TransportError>>>,
    sent: mpsc::UnboundedSender<String>,
}

impl Connection for FakeConnection {
    type Error = TransportError;

    async fn send(&self, line: &str) -> Result<(), TransportError> {
        self.sent
            .send(line.to_owned())
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }

    async fn recv(&self) -> Result<Option<String>, TransportError> {
        Ok(self.inbound.lock().await.recv().await.transpose()?.flatten())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

pub(crate) fn fake(id: u64) -> (FakeConnection, Feed, mpsc::UnboundedReceiver<String>) {
    let (feed, inbound) = mpsc::unbounded_channel();
    let (sent, written) = mpsc::unbounded_channel();
    let conn = FakeConnection {
        id: ConnectionId::new(id),
        inbound: Mutex::new(inbound),
        sent,
    };
    (conn, feed, written)
}
