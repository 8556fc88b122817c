//! Error types for the room layer.
//!
//! Registry operations never fail; absent rooms and unknown clients are
//! ordinary states. Only snapshot persistence can go wrong.

use std::path::PathBuf;

/// Errors that can occur while loading or saving a membership snapshot.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Reading or writing the snapshot file failed.
    #[error("snapshot file {path}: {source}")]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file is not a valid room → members map.
    #[error("snapshot decode failed: {0}")]
    SnapshotDecode(#[source] serde_json::Error),

    /// The snapshot could not be serialized.
    #[error("snapshot encode failed: {0}")]
    SnapshotEncode(#[source] serde_json::Error),
}
