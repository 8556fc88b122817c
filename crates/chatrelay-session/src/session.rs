//! Session types: one accepted connection and its lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chatrelay_protocol::{ClientId, RoomId, RoomName};
use chatrelay_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{SessionError, SessionHandle};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts and limits applied to every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a connection may stay silent before it is closed.
    /// `None` waits forever.
    ///
    /// Default: 300 seconds.
    pub read_timeout: Option<Duration>,

    /// Upper bound on one socket write. A client whose socket does not
    /// drain within this time is disconnected.
    ///
    /// Default: 5 seconds.
    pub write_timeout: Duration,

    /// How long a broadcast waits for room in a client's outbound queue
    /// before skipping that client.
    ///
    /// Default: 2 seconds.
    pub delivery_timeout: Duration,

    /// Lines that may wait in one client's outbound queue.
    ///
    /// Default: 64.
    pub outbound_buffer: usize,

    /// Longest accepted inbound line, in bytes.
    ///
    /// Default: 8 KiB.
    pub max_line_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Some(Duration::from_secs(300)),
            write_timeout: Duration::from_secs(5),
            delivery_timeout: Duration::from_secs(2),
            outbound_buffer: 64,
            max_line_length: chatrelay_transport::DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// ```text
///   Open ──→ Reading ⇄ Dispatching
///     │         │          │
///     └─────────┴──────────┴──→ Closed
/// ```
///
/// - **Open**: connection accepted, writer running, nothing read yet.
/// - **Reading**: waiting for the next line.
/// - **Dispatching**: a line is being parsed and routed. Whatever
///   happens, the session goes back to Reading afterwards.
/// - **Closed**: end of stream, I/O error, or read timeout. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Reading,
    Dispatching,
    Closed,
}

impl SessionState {
    /// Returns `true` if moving from `self` to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Reading)
                | (Self::Reading, Self::Dispatching)
                | (Self::Dispatching, Self::Reading)
                | (Self::Open | Self::Reading | Self::Dispatching, Self::Closed)
        )
    }

    /// Returns `true` once the session has closed.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Reading => write!(f, "Reading"),
            Self::Dispatching => write!(f, "Dispatching"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One client connection, owned by its supervisor task.
///
/// The session owns the connection exclusively. Reads happen on the
/// supervisor task through [`read_line`](Self::read_line); writes happen on
/// a dedicated writer task that drains the queue fed by
/// [`SessionHandle`]s.
pub struct Session<C: Connection<Error = TransportError>> {
    conn: Arc<C>,
    state: SessionState,
    client_id: Option<ClientId>,
    room_names: HashMap<RoomId, RoomName>,
    handle: SessionHandle,
    writer: JoinHandle<()>,
    config: SessionConfig,
}

impl<C: Connection<Error = TransportError>> Session<C> {
    /// Takes ownership of an accepted connection and starts its writer.
    pub fn open(conn: C, config: SessionConfig) -> Self {
        let conn = Arc::new(conn);
        let (handle, outbound) = SessionHandle::channel(
            conn.id(),
            config.outbound_buffer,
            config.delivery_timeout,
        );
        let writer = tokio::spawn(write_loop(
            Arc::clone(&conn),
            outbound,
            config.write_timeout,
        ));

        tracing::debug!(conn_id = %conn.id(), "session opened");

        Self {
            conn,
            state: SessionState::Open,
            client_id: None,
            room_names: HashMap::new(),
            handle,
            writer,
            config,
        }
    }

    /// The id of the underlying connection.
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The client id this session claimed, if it has sent `socket_open`.
    pub fn client_id(&self) -> Option<&ClientId> {
        self.client_id.as_ref()
    }

    /// Records the client id this connection speaks for.
    ///
    /// Returns the previously claimed id if the client re-opened under a
    /// different name.
    pub fn claim(&mut self, client_id: ClientId) -> Option<ClientId> {
        self.client_id.replace(client_id)
    }

    /// Remembers `name` as the display name this client uses for `room`.
    pub fn note_room_name(&mut self, room: RoomId, name: RoomName) {
        self.room_names.insert(room, name);
    }

    /// The last display name seen per room on this connection.
    pub fn room_names(&self) -> &HashMap<RoomId, RoomName> {
        &self.room_names
    }

    /// A cloneable handle for delivering lines to this session.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Moves to `next` if the state machine allows it.
    ///
    /// Returns `false` (and stays put) for an invalid transition.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_transition_to(next) {
            tracing::debug!(
                conn_id = %self.id(),
                from = %self.state,
                to = %next,
                "invalid session transition ignored"
            );
            return false;
        }
        self.state = next;
        true
    }

    /// Waits for the next inbound line.
    ///
    /// Returns `Ok(None)` on a clean end of stream.
    ///
    /// # Errors
    /// - [`SessionError::ReadTimedOut`] — nothing arrived in time
    /// - [`SessionError::Closed`] — the writer died (the peer stopped
    ///   accepting writes)
    /// - [`SessionError::Transport`] — the read itself failed
    pub async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        self.transition(SessionState::Reading);

        let id = self.id();
        if self.writer.is_finished() {
            return Err(SessionError::Closed(id));
        }

        let conn = Arc::clone(&self.conn);
        let read_timeout = self.config.read_timeout;
        let recv = async move {
            match read_timeout {
                Some(limit) => tokio::time::timeout(limit, conn.recv())
                    .await
                    .map_err(|_| SessionError::ReadTimedOut(id))?
                    .map_err(SessionError::from),
                None => conn.recv().await.map_err(SessionError::from),
            }
        };

        tokio::select! {
            line = recv => line,
            _ = &mut self.writer => Err(SessionError::Closed(id)),
        }
    }

    /// Shuts the session down.
    ///
    /// Lines already queued get up to one write timeout to flush; then
    /// the writer is stopped and the transport closed.
    pub async fn close(mut self) {
        self.transition(SessionState::Closed);
        let id = self.id();

        // Our own handle keeps the queue open; without it the writer ends
        // once the queue is drained.
        let Self {
            conn,
            handle,
            mut writer,
            config,
            ..
        } = self;
        drop(handle);

        // read_line may already have polled the writer to completion.
        if !writer.is_finished()
            && tokio::time::timeout(config.write_timeout, &mut writer)
                .await
                .is_err()
        {
            writer.abort();
        }

        match tokio::time::timeout(config.write_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(conn_id = %id, error = %e, "close failed"),
            Err(_) => tracing::debug!(conn_id = %id, "close timed out"),
        }

        tracing::debug!(conn_id = %id, "session closed");
    }
}

/// Drains the outbound queue into the connection until the queue closes
/// or a write fails.
async fn write_loop<C: Connection<Error = TransportError>>(
    conn: Arc<C>,
    mut outbound: mpsc::Receiver<String>,
    write_timeout: Duration,
) {
    let id = conn.id();
    while let Some(line) = outbound.recv().await {
        match tokio::time::timeout(write_timeout, conn.send(&line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn_id = %id, error = %e, "write failed");
                break;
            }
            Err(_) => {
                tracing::debug!(conn_id = %id, "write timed out");
                break;
            }
        }
    }
}
