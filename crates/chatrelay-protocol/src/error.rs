//! Error types for the protocol layer.
//!
//! Each crate in chatrelay defines its own error enum. A `ProtocolError`
//! always means "this line could not be understood", never a network or
//! registry problem. The relay treats every variant the same way: the
//! line is dropped and the connection stays open.

/// Errors that can occur while parsing an inbound line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The line had fewer than the four required fields
    /// (sender, room, room name, verb/text).
    #[error("malformed line: expected at least 4 fields, got {fields}")]
    Malformed {
        /// How many fields the line actually split into.
        fields: usize,
    },

    /// The sender field was empty, so there is no client to act for.
    #[error("malformed line: empty sender id")]
    EmptySender,
}
