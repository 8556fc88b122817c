//! The shared registry: who belongs to which room, who is present, and
//! which session delivers to which client.

use chatrelay_protocol::{ClientId, RoomId, Roster};
use chatrelay_session::SessionHandle;
use chatrelay_transport::ConnectionId;
use dashmap::DashMap;

use crate::MembershipSnapshot;

/// Process-wide room state, shared by every connection task.
///
/// Each map is a `DashMap`, so all reads and writes of one room's sets
/// happen under that room's entry lock. Two tasks touching the same room
/// are serialized; tasks touching different rooms generally are not.
/// Callers never hold a lock across an `.await`: every accessor copies
/// what it needs out of the map before returning.
///
/// Member and presence lists keep insertion order, which is the order
/// rosters are displayed in and the order broadcasts are queued in.
#[derive(Debug, Default)]
pub struct Registry {
    /// Room → subscribed clients. The delivery audience.
    membership: DashMap<RoomId, Vec<ClientId>>,

    /// Room → clients currently entered. The roster.
    present: DashMap<RoomId, Vec<ClientId>>,

    /// Client → the session that delivers to it. Last bind wins.
    handlers: DashMap<ClientId, SessionHandle>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Membership ====================

    /// Subscribes `client` to `room`, creating the room if needed.
    ///
    /// Returns `true` if the client was not already a member.
    pub fn add_membership(&self, room: &RoomId, client: &ClientId) -> bool {
        add_to(&self.membership, room, client, "membership added")
    }

    /// Unsubscribes `client` from `room`. The room's entry is dropped once
    /// it has no members left.
    ///
    /// Returns `true` if the client was a member.
    pub fn remove_membership(&self, room: &RoomId, client: &ClientId) -> bool {
        remove_from(&self.membership, room, client, "membership removed")
    }

    /// Returns `true` if `client` is subscribed to `room`.
    pub fn is_member(&self, room: &RoomId, client: &ClientId) -> bool {
        self.membership
            .get(room)
            .is_some_and(|members| members.contains(client))
    }

    /// Copy of the room's members, in the order they were added.
    pub fn members(&self, room: &RoomId) -> Vec<ClientId> {
        self.membership
            .get(room)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    /// Rooms `client` is subscribed to.
    pub fn rooms_member_of(&self, client: &ClientId) -> Vec<RoomId> {
        rooms_containing(&self.membership, client)
    }

    // ==================== Presence ====================

    /// Marks `client` as present in `room`.
    ///
    /// Returns `true` if the client was not already present.
    pub fn enter_room(&self, room: &RoomId, client: &ClientId) -> bool {
        add_to(&self.present, room, client, "entered room")
    }

    /// Marks `client` as no longer present in `room`. The room's presence
    /// entry is dropped once it empties.
    ///
    /// Returns `true` if the client was present.
    pub fn exit_room(&self, room: &RoomId, client: &ClientId) -> bool {
        remove_from(&self.present, room, client, "exited room")
    }

    /// Returns `true` if `client` is present in `room`.
    pub fn is_present(&self, room: &RoomId, client: &ClientId) -> bool {
        self.present
            .get(room)
            .is_some_and(|present| present.contains(client))
    }

    /// The clients present in `room` right now, in entry order.
    pub fn roster(&self, room: &RoomId) -> Roster {
        self.present
            .get(room)
            .map(|present| Roster::new(present.value().clone()))
            .unwrap_or_default()
    }

    /// Rooms `client` is currently present in.
    pub fn rooms_present_in(&self, client: &ClientId) -> Vec<RoomId> {
        rooms_containing(&self.present, client)
    }

    // ==================== Handlers ====================

    /// Makes `session` the delivery handler for `client`.
    ///
    /// Overwrites any existing binding and returns it.
    pub fn bind_handler(
        &self,
        client: ClientId,
        session: SessionHandle,
    ) -> Option<SessionHandle> {
        let conn_id = session.connection_id();
        let previous = self.handlers.insert(client.clone(), session);
        match &previous {
            Some(old) if old.connection_id() != conn_id => tracing::debug!(
                %client,
                %conn_id,
                replaced = %old.connection_id(),
                "handler rebound"
            ),
            _ => tracing::debug!(%client, %conn_id, "handler bound"),
        }
        previous
    }

    /// The session currently delivering to `client`, if any.
    pub fn resolve_handler(&self, client: &ClientId) -> Option<SessionHandle> {
        self.handlers.get(client).map(|handle| handle.value().clone())
    }

    /// Removes `client`'s handler, but only if it still belongs to
    /// connection `conn_id`.
    ///
    /// Returns `true` if a binding was removed.
    pub fn unbind_handler(&self, client: &ClientId, conn_id: ConnectionId) -> bool {
        let removed = self
            .handlers
            .remove_if(client, |_, handle| handle.connection_id() == conn_id)
            .is_some();
        if removed {
            tracing::debug!(%client, %conn_id, "handler unbound");
        }
        removed
    }

    // ==================== Counts / snapshots ====================

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.membership.len()
    }

    /// Number of clients with a bound handler.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Adds every membership in `snapshot`. Returns how many were new.
    pub fn load_snapshot(&self, snapshot: &MembershipSnapshot) -> usize {
        let mut added = 0;
        for (room, clients) in snapshot.rooms() {
            for client in clients {
                if self.add_membership(room, client) {
                    added += 1;
                }
            }
        }
        tracing::info!(
            rooms = snapshot.len(),
            memberships = added,
            "membership snapshot loaded"
        );
        added
    }

    /// Copies the current membership mapping.
    pub fn snapshot(&self) -> MembershipSnapshot {
        let mut snapshot = MembershipSnapshot::new();
        for entry in self.membership.iter() {
            snapshot.insert(entry.key().clone(), entry.value().clone());
        }
        snapshot
    }
}

fn add_to(
    map: &DashMap<RoomId, Vec<ClientId>>,
    room: &RoomId,
    client: &ClientId,
    what: &'static str,
) -> bool {
    let mut clients = map.entry(room.clone()).or_default();
    if clients.contains(client) {
        return false;
    }
    clients.push(client.clone());
    tracing::debug!(room_id = %room, client_id = %client, count = clients.len(), "{what}");
    true
}

fn remove_from(
    map: &DashMap<RoomId, Vec<ClientId>>,
    room: &RoomId,
    client: &ClientId,
    what: &'static str,
) -> bool {
    // remove_if_mut holds the entry lock for the whole check, so a member
    // added concurrently cannot be lost with the entry.
    let mut removed = false;
    let mut left = 0;
    let emptied = map
        .remove_if_mut(room, |_, clients| {
            let before = clients.len();
            clients.retain(|c| c != client);
            removed = clients.len() != before;
            left = clients.len();
            clients.is_empty()
        })
        .is_some();

    if removed {
        tracing::debug!(room_id = %room, client_id = %client, count = left, "{what}");
    }
    if emptied {
        tracing::debug!(room_id = %room, "room entry pruned");
    }
    removed
}

fn rooms_containing(
    map: &DashMap<RoomId, Vec<ClientId>>,
    client: &ClientId,
) -> Vec<RoomId> {
    map.iter()
        .filter(|entry| entry.value().contains(client))
        .map(|entry| entry.key().clone())
        .collect()
}
