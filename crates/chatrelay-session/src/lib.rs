//! Connection sessions for chatrelay.
//!
//! A session is the server's record of one accepted connection:
//!
//! 1. **Identity** — which [`ClientId`](chatrelay_protocol::ClientId) the
//!    connection claimed with `socket_open` (if any)
//! 2. **State** — where it is in the
//!    Open → Reading → Dispatching → Closed lifecycle ([`SessionState`])
//! 3. **Outbound delivery** — a bounded queue drained by a writer task,
//!    reachable from other tasks through a cloneable [`SessionHandle`]
//! 4. **Room names** — the display name last used per room, for the
//!    notices sent when the client goes away
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay core (above)  ← binds SessionHandles in the registry, broadcasts
//!     ↕
//! Session Layer (this crate)  ← reads lines, queues and writes lines
//!     ↕
//! Transport Layer (below)  ← whole lines over TCP or WebSocket
//! ```

mod error;
mod handle;
mod session;

pub use error::SessionError;
pub use handle::SessionHandle;
pub use session::{Session, SessionConfig, SessionState};
