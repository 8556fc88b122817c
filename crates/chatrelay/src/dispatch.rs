//! Protocol dispatch: one inbound line in, registry changes and
//! broadcasts out.

use std::collections::HashMap;
use std::sync::Arc;

use chatrelay_protocol::{
    ClientId, Codec, DelimitedCodec, Delivery, Inbound, Outbound, ProtocolError,
    RoomId, RoomName, Verb,
};
use chatrelay_room::{BroadcastReport, Broadcaster, Registry};
use chatrelay_session::Session;
use chatrelay_transport::{Connection, ConnectionId, TransportError};

use crate::RelayConfig;

/// Interprets inbound lines against the shared [`Registry`].
///
/// One dispatcher is shared by every connection task. It holds no
/// per-connection state; the caller passes in the [`Session`] the line
/// arrived on.
///
/// | verb | effect |
/// |---|---|
/// | `socket_open` | release a previous id, bind the session as the sender's handler, join listed rooms |
/// | `made_room`, `unblock` | add membership |
/// | `enter` / `join` / `입장` | add membership, enter, roster notice to all members |
/// | `leave` / `exit` / `퇴장` | exit, roster notice to all members |
/// | `block` | remove membership, then re-add and enter |
/// | anything else | chat to every member but the sender |
pub struct Dispatcher<K = DelimitedCodec> {
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    codec: K,
    prune_membership_on_close: bool,
}

impl Dispatcher<DelimitedCodec> {
    /// Creates a dispatcher using the codec and cleanup policy in `config`.
    pub fn new(registry: Arc<Registry>, config: &RelayConfig) -> Self {
        Self::with_codec(registry, config.codec())
            .prune_membership_on_close(config.prune_membership_on_close)
    }
}

impl<K: Codec> Dispatcher<K> {
    /// Creates a dispatcher with a custom line codec.
    pub fn with_codec(registry: Arc<Registry>, codec: K) -> Self {
        Self {
            broadcaster: Broadcaster::new(Arc::clone(&registry)),
            registry,
            codec,
            prune_membership_on_close: true,
        }
    }

    /// Sets whether [`release`](Self::release) also drops memberships.
    pub fn prune_membership_on_close(mut self, prune: bool) -> Self {
        self.prune_membership_on_close = prune;
        self
    }

    /// The registry this dispatcher mutates.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Parses `line` and applies it on behalf of `session`.
    ///
    /// Returns once every broadcast the line triggered has been queued (or
    /// timed out) for its recipients.
    ///
    /// # Errors
    /// Returns [`ProtocolError`] for a line that cannot be parsed. Nothing
    /// has been changed in that case; callers drop the line and keep
    /// reading.
    pub async fn dispatch<C>(
        &self,
        line: &str,
        session: &mut Session<C>,
    ) -> Result<Inbound, ProtocolError>
    where
        C: Connection<Error = TransportError>,
    {
        let inbound = self.codec.decode(line)?;
        let verb = inbound.verb();
        let sender = &inbound.sender;
        let room = &inbound.room;

        if verb != Verb::SocketOpen {
            session.note_room_name(room.clone(), inbound.room_name.clone());
        }

        match verb {
            Verb::SocketOpen => self.open(&inbound, session).await,
            Verb::MadeRoom | Verb::Unblock => {
                self.registry.add_membership(room, sender);
            }
            Verb::Enter => {
                self.registry.add_membership(room, sender);
                if self.registry.enter_room(room, sender) {
                    tracing::info!(client_id = %sender, room_id = %room, "entered room");
                }
            }
            Verb::Leave => {
                if !self.registry.exit_room(room, sender) {
                    return Ok(inbound);
                }
                tracing::info!(client_id = %sender, room_id = %room, "left room");
            }
            Verb::Block => {
                // TODO: keep a per-room block-list and refuse re-entry
                // once the intended semantics of `block` are settled.
                self.registry.remove_membership(room, sender);
                self.registry.add_membership(room, sender);
                self.registry.enter_room(room, sender);
            }
            Verb::Chat => {
                self.announce(&inbound, Delivery::AllExcept(sender.clone()))
                    .await;
            }
        }

        if verb.changes_roster() {
            self.announce(&inbound, Delivery::All).await;
        }
        Ok(inbound)
    }

    /// Clears what `client` left behind when connection `conn_id` closed.
    ///
    /// The client exits every room it is present in (the remaining
    /// members get a `leave` roster notice), its handler is unbound and,
    /// if configured, its memberships are dropped. `room_names` supplies
    /// the display names for the notices; rooms missing from it are named
    /// by their id.
    ///
    /// Nothing happens if the client's handler has meanwhile been bound
    /// to a different connection. The binding is checked again before
    /// each room and before pruning, so a reconnect that lands while the
    /// notices go out stops the cleanup there. Returns `true` if cleanup
    /// ran to the end.
    pub async fn release(
        &self,
        client: &ClientId,
        conn_id: ConnectionId,
        room_names: &HashMap<RoomId, RoomName>,
    ) -> bool {
        if self.rebound_elsewhere(client, conn_id) {
            return false;
        }
        self.registry.unbind_handler(client, conn_id);

        for room in self.registry.rooms_present_in(client) {
            if self.rebound_elsewhere(client, conn_id) {
                return false;
            }
            if !self.registry.exit_room(&room, client) {
                continue;
            }
            let notice = Outbound {
                sender: client.clone(),
                room_name: room_names
                    .get(&room)
                    .cloned()
                    .unwrap_or_else(|| RoomName::from(room.as_str())),
                text: Verb::Leave.as_str().to_owned(),
                roster: self.registry.roster(&room),
                room,
            };
            let line = self.codec.encode(&notice);
            self.broadcaster
                .broadcast(&notice.room, &Delivery::AllExcept(client.clone()), &line)
                .await;
            tracing::info!(client_id = %client, room_id = %notice.room, "left room on disconnect");
        }

        if self.prune_membership_on_close {
            if self.rebound_elsewhere(client, conn_id) {
                return false;
            }
            for room in self.registry.rooms_member_of(client) {
                self.registry.remove_membership(&room, client);
            }
        }
        true
    }

    /// Returns `true` if `client`'s handler belongs to a connection other
    /// than `conn_id`.
    fn rebound_elsewhere(&self, client: &ClientId, conn_id: ConnectionId) -> bool {
        match self.registry.resolve_handler(client) {
            Some(current) if current.connection_id() != conn_id => {
                tracing::debug!(
                    client_id = %client,
                    %conn_id,
                    bound_to = %current.connection_id(),
                    "client rebound elsewhere, skipping cleanup"
                );
                true
            }
            _ => false,
        }
    }

    /// Binds `session` as the sender's handler and joins the rooms the
    /// line lists.
    ///
    /// A session that re-opens under a new id gives up the old one first,
    /// exactly as if it had disconnected.
    async fn open<C>(&self, inbound: &Inbound, session: &mut Session<C>)
    where
        C: Connection<Error = TransportError>,
    {
        let conn_id = session.id();
        let sender = &inbound.sender;

        if let Some(previous) = session.claim(sender.clone()) {
            if &previous != sender {
                tracing::info!(client_id = %sender, previous = %previous, %conn_id, "client renamed");
                self.release(&previous, conn_id, session.room_names()).await;
            }
        }
        self.registry.bind_handler(sender.clone(), session.handle());

        let rooms = inbound.rooms();
        for room in &rooms {
            self.registry.add_membership(room, sender);
        }
        tracing::info!(client_id = %sender, %conn_id, rooms = rooms.len(), "client opened");
    }

    /// Broadcasts `inbound` back to the room, tagged with its roster.
    async fn announce(&self, inbound: &Inbound, delivery: Delivery) -> BroadcastReport {
        let roster = self.registry.roster(&inbound.room);
        let line = self.codec.encode(&Outbound::echo(inbound, roster));
        self.broadcaster
            .broadcast(&inbound.room, &delivery, &line)
            .await
    }
}
