//! Wire protocol for chatrelay.
//!
//! This crate defines the "language" that clients and the relay speak:
//!
//! - **Types** ([`Inbound`], [`Outbound`], [`Verb`], [`Roster`], ids) —
//!   the structures a text line is parsed into or rendered from.
//! - **Codec** ([`Codec`] trait, [`DelimitedCodec`]) — how those
//!   structures map to and from a single line of text.
//! - **Errors** ([`ProtocolError`]) — why a line could not be parsed.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (whole lines) and the relay
//! core (registry, dispatch). It doesn't know about connections or rooms
//! as live objects; it only knows the shape of a line.
//!
//! ```text
//! Transport (line) → Protocol (Inbound) → Dispatcher (registry action)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, DelimitedCodec, DEFAULT_DELIMITER};
pub use error::ProtocolError;
pub use types::{
    ClientId, Delivery, Inbound, Outbound, RoomId, RoomName, Roster, Verb,
};
