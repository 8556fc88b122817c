//! The cloneable delivery end of a session.

use std::time::Duration;

use chatrelay_transport::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::SessionError;

/// Handle for delivering lines to one session from any task.
///
/// This is cheap to clone: it is an `mpsc::Sender` plus the id of the
/// connection behind it. The registry stores one per bound client, and
/// broadcasts clone it out of the registry before delivering so no lock
/// is held while waiting on a slow client.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    conn_id: ConnectionId,
    sender: mpsc::Sender<String>,
    delivery_timeout: Duration,
}

impl SessionHandle {
    /// Creates a handle and the queue receiver it feeds.
    ///
    /// `buffer` bounds how many lines may wait for the writer;
    /// `delivery_timeout` bounds how long [`deliver`](Self::deliver)
    /// waits for room in a full queue.
    pub fn channel(
        conn_id: ConnectionId,
        buffer: usize,
        delivery_timeout: Duration,
    ) -> (Self, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (
            Self {
                conn_id,
                sender,
                delivery_timeout,
            },
            receiver,
        )
    }

    /// The connection this handle writes to.
    pub fn connection_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Returns `true` once the session's writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queues one line for the session's writer.
    ///
    /// # Errors
    /// - [`SessionError::DeliveryTimedOut`] — the queue stayed full for
    ///   the whole delivery timeout (the client is not reading)
    /// - [`SessionError::Closed`] — the session has shut down
    pub async fn deliver(&self, line: String) -> Result<(), SessionError> {
        self.sender
            .send_timeout(line, self.delivery_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => {
                    SessionError::DeliveryTimedOut(self.conn_id)
                }
                SendTimeoutError::Closed(_) => SessionError::Closed(self.conn_id),
            })
    }
}
