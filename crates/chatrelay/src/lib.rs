//! # chatrelay
//!
//! A line-oriented chat relay. Clients connect over TCP (or WebSocket with
//! the `websocket` feature), join named rooms, and exchange text lines that
//! the relay fans out to the other members of each room.
//!
//! Every line a client sends has the shape
//!
//! ```text
//! sender|room|room name|verb or message text
//! ```
//!
//! and every line it receives repeats it with the room's roster appended.
//! See [`Dispatcher`] for the verbs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatrelay::prelude::*;
//!
//! # async fn run() -> Result<(), ChatRelayError> {
//! let server = ChatRelayServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Layers
//!
//! | crate | role |
//! |---|---|
//! | `chatrelay-transport` | accept connections, frame lines |
//! | `chatrelay-protocol` | parse and render lines |
//! | `chatrelay-session` | one connection's lifecycle and outbound queue |
//! | `chatrelay-room` | shared registry and broadcast fan-out |
//! | `chatrelay` | dispatch, supervision, the server loop |

mod config;
mod dispatch;
mod error;
mod server;
mod supervisor;
#[cfg(test)]
mod testing;

pub use config::RelayConfig;
pub use dispatch::Dispatcher;
pub use error::ChatRelayError;
pub use server::{ChatRelayServer, ChatRelayServerBuilder};
pub use supervisor::supervise;

pub use chatrelay_protocol as protocol;
pub use chatrelay_room as room;
pub use chatrelay_session as session;
pub use chatrelay_transport as transport;

/// The types most applications need.
pub mod prelude {
    pub use crate::{
        ChatRelayError, ChatRelayServer, ChatRelayServerBuilder, Dispatcher,
        RelayConfig, supervise,
    };
    pub use chatrelay_protocol::{
        ClientId, Codec, DelimitedCodec, Delivery, Inbound, Outbound, RoomId,
        RoomName, Roster, Verb,
    };
    pub use chatrelay_room::{BroadcastReport, Broadcaster, MembershipSnapshot, Registry};
    pub use chatrelay_session::{SessionConfig, SessionHandle};
    pub use chatrelay_transport::{Connection, ConnectionId, Transport};
}
