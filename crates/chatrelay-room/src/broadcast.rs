//! Broadcast fan-out: one line, many members.

use std::sync::Arc;

use chatrelay_protocol::{ClientId, Delivery, RoomId};
use chatrelay_session::SessionHandle;
use futures_util::future::join_all;

use crate::Registry;

/// What happened to one broadcast's intended recipients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose queue accepted the line.
    pub delivered: usize,
    /// Recipients with no bound handler (unknown or disconnected).
    pub skipped: usize,
    /// Recipients whose queue was closed or stayed full past the
    /// delivery timeout.
    pub failed: usize,
}

impl BroadcastReport {
    /// Total number of members the broadcast targeted.
    pub fn targeted(&self) -> usize {
        self.delivered + self.skipped + self.failed
    }
}

/// Delivers pre-formatted lines to the members of a room.
///
/// The audience is the room's *membership* set at the moment of the call,
/// filtered by [`Delivery`]. The member list and the handlers are copied
/// out of the registry first, so no registry lock is held while waiting
/// on a client. Deliveries to different clients run concurrently and each
/// is bounded by its session's delivery timeout.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    /// Creates a broadcaster over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Sends `line` to every member of `room` selected by `delivery`.
    ///
    /// Never fails: unknown clients are skipped and slow or closed
    /// sessions are counted in the report, nothing is surfaced to the
    /// caller.
    pub async fn broadcast(
        &self,
        room: &RoomId,
        delivery: &Delivery,
        line: &str,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        let targets: Vec<(ClientId, SessionHandle)> = self
            .registry
            .members(room)
            .into_iter()
            .filter(|member| delivery.includes(member))
            .filter_map(|member| match self.registry.resolve_handler(&member) {
                Some(handle) => Some((member, handle)),
                None => {
                    report.skipped += 1;
                    None
                }
            })
            .collect();

        let results = join_all(targets.iter().map(|(member, handle)| async move {
            (member, handle.deliver(line.to_owned()).await)
        }))
        .await;

        for (member, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::debug!(
                        room_id = %room,
                        client_id = %member,
                        error = %e,
                        "delivery dropped"
                    );
                }
            }
        }

        tracing::trace!(
            room_id = %room,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "broadcast done"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chatrelay_transport::ConnectionId;
    use tokio::sync::mpsc;

    use super::*;

    fn room() -> RoomId {
        RoomId::from("R1")
    }

    /// Registers `id` as a member of R1 with a bound handler, returning
    /// the queue its deliveries land in.
    fn member(
        reg: &Registry,
        id: &str,
        conn: u64,
        buffer: usize,
    ) -> mpsc::Receiver<String> {
        let (handle, rx) = SessionHandle::channel(
            ConnectionId::new(conn),
            buffer,
            Duration::from_millis(100),
        );
        reg.add_membership(&room(), &ClientId::from(id));
        reg.bind_handler(ClientId::from(id), handle);
        rx
    }

    #[tokio::test]
    async fn test_exclusive_skips_sender() {
        let reg = Arc::new(Registry::new());
        let mut a = member(&reg, "A", 1, 4);
        let mut b = member(&reg, "B", 2, 4);
        let mut c = member(&reg, "C", 3, 4);
        let caster = Broadcaster::new(Arc::clone(&reg));

        let report = caster
            .broadcast(&room(), &Delivery::AllExcept("A".into()), "hi")
            .await;

        assert_eq!(report.delivered, 2);
        assert_eq!(b.recv().await.as_deref(), Some("hi"));
        assert_eq!(c.recv().await.as_deref(), Some("hi"));
        assert!(a.try_recv().is_err(), "sender must not receive");
    }

    #[tokio::test]
    async fn test_inclusive_reaches_sender() {
        let reg = Arc::new(Registry::new());
        let mut a = member(&reg, "A", 1, 4);
        let mut b = member(&reg, "B", 2, 4);
        let caster = Broadcaster::new(Arc::clone(&reg));

        let report = caster.broadcast(&room(), &Delivery::All, "notice").await;

        assert_eq!(report.delivered, 2);
        assert_eq!(a.recv().await.as_deref(), Some("notice"));
        assert_eq!(b.recv().await.as_deref(), Some("notice"));
    }

    #[tokio::test]
    async fn test_members_without_handler_are_skipped() {
        let reg = Arc::new(Registry::new());
        let mut a = member(&reg, "A", 1, 4);
        reg.add_membership(&room(), &ClientId::from("offline"));
        let caster = Broadcaster::new(Arc::clone(&reg));

        let report = caster.broadcast(&room(), &Delivery::All, "x").await;

        assert_eq!(report, BroadcastReport { delivered: 1, skipped: 1, failed: 0 });
        assert_eq!(report.targeted(), 2);
        assert_eq!(a.recv().await.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_unknown_room_is_a_quiet_noop() {
        let reg = Arc::new(Registry::new());
        let caster = Broadcaster::new(reg);

        let report = caster
            .broadcast(&RoomId::from("nowhere"), &Delivery::All, "x")
            .await;

        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_does_not_starve_other_members() {
        let reg = Arc::new(Registry::new());
        // "slow" never drains and already has a full queue.
        let _slow = member(&reg, "slow", 1, 1);
        reg.resolve_handler(&"slow".into())
            .unwrap()
            .deliver("backlog".into())
            .await
            .unwrap();
        let mut fast = member(&reg, "fast", 2, 4);
        let caster = Broadcaster::new(Arc::clone(&reg));

        let report = caster.broadcast(&room(), &Delivery::All, "hello").await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(fast.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_two_broadcasts_arrive_in_order() {
        let reg = Arc::new(Registry::new());
        let mut b = member(&reg, "B", 2, 4);
        let caster = Broadcaster::new(Arc::clone(&reg));

        caster.broadcast(&room(), &Delivery::All, "first").await;
        caster.broadcast(&room(), &Delivery::All, "second").await;

        assert_eq!(b.recv().await.as_deref(), Some("first"));
        assert_eq!(b.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_closed_session_counts_as_failed() {
        let reg = Arc::new(Registry::new());
        let rx = member(&reg, "gone", 1, 4);
        drop(rx);
        let caster = Broadcaster::new(Arc::clone(&reg));

        let report = caster.broadcast(&room(), &Delivery::All, "x").await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 0);
    }
}
