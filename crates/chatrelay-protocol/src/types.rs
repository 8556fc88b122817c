//! Core protocol types for chatrelay's line format.
//!
//! Every inbound line has the shape
//!
//! ```text
//! sender|room|room name|verb or message text
//! ```
//!
//! and every outbound line repeats that shape with one trailing field,
//! the roster of clients currently present in the room:
//!
//! ```text
//! sender|room|room name|verb or message text|A,B,C
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The identifier a client announces for itself.
///
/// The relay never generates these: whatever the client puts in the first
/// field of a line is trusted as its identity. A newtype keeps it from
/// being mixed up with a [`RoomId`] even though both are strings.
///
/// `#[serde(transparent)]` makes a `ClientId("alice")` serialize as just
/// `"alice"`, which keeps persisted snapshots readable.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub String);

/// The identifier of a room (a named broadcast domain).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub String);

/// A room's display label.
///
/// Redundant with [`RoomId`] and forwarded verbatim; it is never checked
/// for consistency with the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(ClientId);
string_id!(RoomId);
string_id!(RoomName);

// ---------------------------------------------------------------------------
// Verb
// ---------------------------------------------------------------------------

/// The action carried in field 3 of an inbound line.
///
/// The set is closed: anything that is not a recognized keyword is a
/// [`Verb::Chat`] message, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Bind this connection as the delivery handler for the sender.
    SocketOpen,
    /// Subscribe the sender to the room.
    MadeRoom,
    /// Subscribe (if needed) and mark the sender present in the room.
    Enter,
    /// Mark the sender no longer present in the room.
    Leave,
    /// Remove and immediately re-admit the sender.
    Block,
    /// Re-subscribe the sender to the room.
    Unblock,
    /// Free-form chat text.
    Chat,
}

impl Verb {
    /// Classifies the text of field 3.
    ///
    /// `enter` and `leave` also accept `join`/`입장` and `exit`/`퇴장`;
    /// any text *ending* in `socket_open` counts as an open so clients
    /// that prefix it keep working.
    pub fn parse(text: &str) -> Self {
        match text {
            "made_room" => Self::MadeRoom,
            "enter" | "join" | "입장" => Self::Enter,
            "leave" | "exit" | "퇴장" => Self::Leave,
            "block" => Self::Block,
            "unblock" => Self::Unblock,
            t if t.ends_with("socket_open") => Self::SocketOpen,
            _ => Self::Chat,
        }
    }

    /// The canonical keyword for this verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SocketOpen => "socket_open",
            Self::MadeRoom => "made_room",
            Self::Enter => "enter",
            Self::Leave => "leave",
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::Chat => "chat",
        }
    }

    /// Returns `true` for verbs that change who is present in a room and
    /// therefore produce a roster notification.
    pub fn changes_roster(&self) -> bool {
        matches!(self, Self::Enter | Self::Leave | Self::Block)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// The clients present in a room, in the order they entered.
///
/// Displays as a comma-joined list: `A,B,C`. An empty roster displays as
/// the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster(Vec<ClientId>);

impl Roster {
    /// Creates a roster from an ordered list of clients.
    pub fn new(clients: Vec<ClientId>) -> Self {
        Self(clients)
    }

    /// Number of clients in the roster.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nobody is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `client` is in the roster.
    pub fn contains(&self, client: &ClientId) -> bool {
        self.0.contains(client)
    }
}

impl From<Vec<ClientId>> for Roster {
    fn from(clients: Vec<ClientId>) -> Self {
        Self(clients)
    }
}

impl fmt::Display for Roster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, client) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(client.as_str())?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Selects which members of a room receive a broadcast.
///
/// The audience is always drawn from the room's membership set; this
/// enum only decides whom to leave out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Every member of the room, the sender included.
    All,

    /// Every member except the given client (usually the sender).
    AllExcept(ClientId),
}

impl Delivery {
    /// Returns `true` if a member with this id is part of the audience.
    pub fn includes(&self, member: &ClientId) -> bool {
        match self {
            Self::All => true,
            Self::AllExcept(excluded) => excluded != member,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound / Outbound lines
// ---------------------------------------------------------------------------

/// A parsed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Field 0: who is speaking.
    pub sender: ClientId,
    /// Field 1: which room the line is about.
    pub room: RoomId,
    /// Field 2: the room's display name, echoed back untouched.
    pub room_name: RoomName,
    /// Field 3 and everything after it: a verb keyword or chat text.
    pub text: String,
}

impl Inbound {
    /// Classifies [`text`](Self::text) into a [`Verb`].
    pub fn verb(&self) -> Verb {
        Verb::parse(&self.text)
    }

    /// Expands the room field into a list of rooms.
    ///
    /// A `socket_open` line may carry every room the client belongs to in
    /// the room field, written as `[R1, R2, R3]`. The brackets are
    /// optional, so a plain `R1` is a list of one; a blank field names no
    /// room at all.
    pub fn rooms(&self) -> Vec<RoomId> {
        let raw = self.room.as_str().trim();
        let list = raw
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .unwrap_or(raw);
        list.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(RoomId::from)
            .collect()
    }
}

/// A line the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// The client the line is about.
    pub sender: ClientId,
    /// The room the line belongs to.
    pub room: RoomId,
    /// The room's display name, as the client sent it.
    pub room_name: RoomName,
    /// The verb keyword that fired, or the chat text.
    pub text: String,
    /// Clients present in the room when the line was built.
    pub roster: Roster,
}

impl Outbound {
    /// Builds an outbound line that echoes an inbound one, tagged with
    /// `roster`.
    pub fn echo(inbound: &Inbound, roster: Roster) -> Self {
        Self {
            sender: inbound.sender.clone(),
            room: inbound.room.clone(),
            room_name: inbound.room_name.clone(),
            text: inbound.text.clone(),
            roster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(room: &str, text: &str) -> Inbound {
        Inbound {
            sender: "A".into(),
            room: room.into(),
            room_name: "General".into(),
            text: text.into(),
        }
    }

    // =====================================================================
    // Ids
    // =====================================================================

    #[test]
    fn test_ids_display_their_raw_value() {
        assert_eq!(ClientId::from("alice").to_string(), "alice");
        assert_eq!(RoomId::from("R1").to_string(), "R1");
        assert_eq!(RoomName::from("General").as_str(), "General");
    }

    #[test]
    fn test_client_id_serializes_transparently() {
        let json = serde_json::to_string(&ClientId::from("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    // =====================================================================
    // Verb
    // =====================================================================

    #[test]
    fn test_verb_parse_keywords() {
        assert_eq!(Verb::parse("socket_open"), Verb::SocketOpen);
        assert_eq!(Verb::parse("made_room"), Verb::MadeRoom);
        assert_eq!(Verb::parse("enter"), Verb::Enter);
        assert_eq!(Verb::parse("leave"), Verb::Leave);
        assert_eq!(Verb::parse("block"), Verb::Block);
        assert_eq!(Verb::parse("unblock"), Verb::Unblock);
    }

    #[test]
    fn test_verb_parse_aliases() {
        assert_eq!(Verb::parse("입장"), Verb::Enter);
        assert_eq!(Verb::parse("join"), Verb::Enter);
        assert_eq!(Verb::parse("퇴장"), Verb::Leave);
        assert_eq!(Verb::parse("exit"), Verb::Leave);
        assert_eq!(Verb::parse("client_socket_open"), Verb::SocketOpen);
    }

    #[test]
    fn test_verb_parse_unknown_is_chat() {
        assert_eq!(Verb::parse("hello"), Verb::Chat);
        assert_eq!(Verb::parse(""), Verb::Chat);
        // Keywords are exact: surrounding text makes it chat.
        assert_eq!(Verb::parse("enter now"), Verb::Chat);
        assert_eq!(Verb::parse("Enter"), Verb::Chat);
    }

    #[test]
    fn test_verb_changes_roster() {
        assert!(Verb::Enter.changes_roster());
        assert!(Verb::Leave.changes_roster());
        assert!(Verb::Block.changes_roster());
        assert!(!Verb::Chat.changes_roster());
        assert!(!Verb::MadeRoom.changes_roster());
    }

    // =====================================================================
    // Roster
    // =====================================================================

    #[test]
    fn test_roster_display_is_comma_joined_in_order() {
        let roster = Roster::new(vec!["A".into(), "B".into(), "C".into()]);
        assert_eq!(roster.to_string(), "A,B,C");
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_empty_roster_displays_empty() {
        let roster = Roster::default();
        assert!(roster.is_empty());
        assert_eq!(roster.to_string(), "");
    }

    // =====================================================================
    // Delivery
    // =====================================================================

    #[test]
    fn test_delivery_includes() {
        let a = ClientId::from("A");
        let b = ClientId::from("B");

        assert!(Delivery::All.includes(&a));
        assert!(!Delivery::AllExcept(a.clone()).includes(&a));
        assert!(Delivery::AllExcept(a).includes(&b));
    }

    // =====================================================================
    // Inbound
    // =====================================================================

    #[test]
    fn test_inbound_rooms_single() {
        assert_eq!(inbound("R1", "socket_open").rooms(), vec![RoomId::from("R1")]);
    }

    #[test]
    fn test_inbound_rooms_bracketed_list() {
        let rooms = inbound("[R1, R2,R3]", "socket_open").rooms();
        assert_eq!(
            rooms,
            vec![RoomId::from("R1"), RoomId::from("R2"), RoomId::from("R3")]
        );
    }

    #[test]
    fn test_inbound_rooms_blank_field() {
        assert!(inbound("", "socket_open").rooms().is_empty());
    }

    #[test]
    fn test_inbound_rooms_empty_brackets() {
        assert!(inbound("[]", "socket_open").rooms().is_empty());
    }

    #[test]
    fn test_outbound_echo_copies_fields() {
        let line = inbound("R1", "입장");
        let out = Outbound::echo(&line, Roster::new(vec!["A".into()]));
        assert_eq!(out.sender, line.sender);
        assert_eq!(out.text, "입장");
        assert_eq!(out.roster.to_string(), "A");
    }
}
