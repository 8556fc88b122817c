//! Room membership and broadcast fan-out for chatrelay.
//!
//! All room state lives in one shared [`Registry`]; there are no per-room
//! tasks. Rooms exist implicitly: a room appears when its first member is
//! added and disappears when its last member is removed.
//!
//! # Key types
//!
//! - [`Registry`] — membership, presence, and client → session handlers
//! - [`Broadcaster`] — delivers one line to a subset of a room's members
//! - [`BroadcastReport`] — what happened to each intended recipient
//! - [`MembershipSnapshot`] — membership persisted between runs

mod broadcast;
mod error;
mod registry;
mod snapshot;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use error::RoomError;
pub use registry::Registry;
pub use snapshot::MembershipSnapshot;
