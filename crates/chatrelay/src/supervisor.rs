//! Per-connection supervision: read, dispatch, and clean up on close.
//!
//! Each accepted connection gets its own Tokio task running [`supervise`].
//! The flow is:
//!   1. Open a [`Session`] (starts the outbound writer)
//!   2. Loop: read one line → dispatch it → read again
//!   3. On end of stream, I/O error, or idle timeout: release the client's
//!      rooms and handler, then close the session

use std::sync::Arc;

use chatrelay_protocol::Codec;
use chatrelay_session::{Session, SessionConfig, SessionError, SessionState};
use chatrelay_transport::{Connection, TransportError};

use crate::{ChatRelayError, Dispatcher};

/// Runs one connection from accept to close.
///
/// Malformed lines are dropped and the connection stays open. The
/// connection ends when the peer closes it, a read or write fails, or
/// nothing arrives within the read timeout. Every ending goes through the
/// same teardown: the client leaves the rooms it was present in (the
/// remaining members are told), its handler is unbound and the transport
/// is closed.
///
/// # Errors
/// Returns the error that ended the connection, for logging only. A clean
/// close by the peer is `Ok(())`.
pub async fn supervise<C, K>(
    conn: C,
    dispatcher: Arc<Dispatcher<K>>,
    config: SessionConfig,
) -> Result<(), ChatRelayError>
where
    C: Connection<Error = TransportError>,
    K: Codec,
{
    let mut session = Session::open(conn, config);
    let conn_id = session.id();
    tracing::info!(%conn_id, "connection opened");

    let outcome = loop {
        let line = match session.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed by peer");
                break Ok(());
            }
            Err(e @ SessionError::ReadTimedOut(_)) => {
                tracing::info!(%conn_id, "connection idle, closing");
                break Err(e);
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "read failed");
                break Err(e);
            }
        };

        session.transition(SessionState::Dispatching);
        if let Err(e) = dispatcher.dispatch(&line, &mut session).await {
            tracing::trace!(%conn_id, error = %e, %line, "line discarded");
        }
        session.transition(SessionState::Reading);
    };

    session.transition(SessionState::Closed);
    if let Some(client) = session.client_id().cloned() {
        dispatcher.release(&client, conn_id, session.room_names()).await;
    }
    session.close().await;

    tracing::info!(%conn_id, "connection closed");
    outcome.map_err(ChatRelayError::from)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatrelay_protocol::{ClientId, RoomId};
    use chatrelay_room::Registry;
    use chatrelay_transport::ConnectionId;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::RelayConfig;
    use crate::testing::{Feed, fake};

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            Arc::new(Registry::new()),
            &RelayConfig::default(),
        ))
    }

    fn spawn(
        d: &Arc<Dispatcher>,
        id: u64,
        config: SessionConfig,
    ) -> (Feed, mpsc::UnboundedReceiver<String>, JoinHandle<Result<(), ChatRelayError>>) {
        let (conn, feed, written) = fake(id);
        let task = tokio::spawn(supervise(conn, Arc::clone(d), config));
        (feed, written, task)
    }

    async fn next_line(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for line")
            .expect("connection closed")
    }

    fn send(feed: &Feed, line: &str) {
        feed.send(Ok(Some(line.to_owned()))).unwrap();
    }

    #[tokio::test]
    async fn test_clean_close_is_ok() {
        let d = dispatcher();
        let (feed, _written, task) = spawn(&d, 1, SessionConfig::default());

        drop(feed);

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_malformed_line_keeps_connection_open() {
        let d = dispatcher();
        let (feed, mut written, task) = spawn(&d, 1, SessionConfig::default());

        send(&feed, "garbage");
        send(&feed, "A|[]|-|socket_open");
        send(&feed, "A|R1|General|enter");

        assert_eq!(next_line(&mut written).await, "A|R1|General|enter|A");
        drop(feed);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_cleans_registry_and_notifies_others() {
        let d = dispatcher();
        let (a_feed, _a_written, a_task) = spawn(&d, 1, SessionConfig::default());
        let (b_feed, mut b_written, _b_task) = spawn(&d, 2, SessionConfig::default());

        send(&b_feed, "B|[]|-|socket_open");
        send(&b_feed, "B|R1|Lobby|enter");
        assert_eq!(next_line(&mut b_written).await, "B|R1|Lobby|enter|B");

        send(&a_feed, "A|[]|-|socket_open");
        send(&a_feed, "A|R1|Lobby|enter");
        assert_eq!(next_line(&mut b_written).await, "A|R1|Lobby|enter|B,A");

        drop(a_feed);
        a_task.await.unwrap().unwrap();

        assert_eq!(next_line(&mut b_written).await, "A|R1|Lobby|leave|B");
        let reg = d.registry();
        assert!(reg.resolve_handler(&ClientId::from("A")).is_none());
        assert!(reg.rooms_present_in(&ClientId::from("A")).is_empty());
        assert!(reg.rooms_member_of(&ClientId::from("A")).is_empty());
        assert_eq!(reg.roster(&RoomId::from("R1")).to_string(), "B");
    }

    #[tokio::test]
    async fn test_transport_error_ends_session_with_cleanup() {
        let d = dispatcher();
        let (feed, _written, task) = spawn(&d, 4, SessionConfig::default());
        send(&feed, "A|[]|-|socket_open");
        send(&feed, "A|R1|General|enter");

        feed.send(Err(TransportError::Framing("line too long".into())))
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(ChatRelayError::Session(SessionError::Transport(_)))
        ));
        assert!(d.registry().resolve_handler(&ClientId::from("A")).is_none());
        assert!(!d.registry().is_present(&RoomId::from("R1"), &ClientId::from("A")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_connection_times_out() {
        let d = dispatcher();
        let config = SessionConfig {
            read_timeout: Some(Duration::from_secs(30)),
            ..SessionConfig::default()
        };
        let (feed, _written, task) = spawn(&d, 5, config);
        send(&feed, "A|[]|-|socket_open");

        let result = task.await.unwrap();

        assert!(matches!(
            result,
            Err(ChatRelayError::Session(SessionError::ReadTimedOut(id))) if id == ConnectionId::new(5)
        ));
        assert_eq!(d.registry().handler_count(), 0);
    }

    #[tokio::test]
    async fn test_anonymous_connection_leaves_no_trace() {
        // Never sent socket_open: nothing to release.
        let d = dispatcher();
        let (feed, _written, task) = spawn(&d, 6, SessionConfig::default());
        send(&feed, "A|R1|General|made_room");

        drop(feed);
        task.await.unwrap().unwrap();

        assert!(d.registry().is_member(&RoomId::from("R1"), &ClientId::from("A")));
    }
}
