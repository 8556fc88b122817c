//! Durable room membership: a JSON object of room id to member ids.
//!
//! ```json
//! { "R1": ["A", "B"], "R2": ["C"] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chatrelay_protocol::{ClientId, RoomId};
use serde::{Deserialize, Serialize};

use crate::RoomError;

/// A point-in-time copy of the registry's membership mapping.
///
/// Only membership is persisted. Presence and handler bindings belong to
/// live connections and are rebuilt as clients reconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MembershipSnapshot {
    rooms: BTreeMap<RoomId, Vec<ClientId>>,
}

impl MembershipSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the members of `room`, replacing any previous list.
    pub fn insert(&mut self, room: RoomId, members: Vec<ClientId>) {
        self.rooms.insert(room, members);
    }

    /// Iterates rooms in id order with their members.
    pub fn rooms(&self) -> impl Iterator<Item = (&RoomId, &[ClientId])> {
        self.rooms
            .iter()
            .map(|(room, members)| (room, members.as_slice()))
    }

    /// Number of rooms in the snapshot.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if the snapshot holds no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Parses a snapshot from JSON text.
    pub fn from_json(text: &str) -> Result<Self, RoomError> {
        serde_json::from_str(text).map_err(RoomError::SnapshotDecode)
    }

    /// Renders the snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, RoomError> {
        serde_json::to_string_pretty(self).map_err(RoomError::SnapshotEncode)
    }

    /// Reads a snapshot from `path`.
    ///
    /// # Errors
    /// [`RoomError::SnapshotIo`] if the file cannot be read and
    /// [`RoomError::SnapshotDecode`] if it is not a valid snapshot.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RoomError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|source| {
            RoomError::SnapshotIo {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json(&text)
    }

    /// Reads a snapshot from `path`, falling back to an empty one.
    ///
    /// A missing file is normal on first start and is logged at `info`;
    /// any other failure is logged at `warn`. Neither stops the caller.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path).await {
            Ok(snapshot) => snapshot,
            Err(RoomError::SnapshotIo { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                tracing::info!(path = %path.display(), "no membership snapshot, starting empty");
                Self::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "membership snapshot unreadable, starting empty");
                Self::new()
            }
        }
    }

    /// Writes the snapshot to `path` as JSON, replacing the file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), RoomError> {
        let path = path.as_ref();
        let text = self.to_json()?;
        tokio::fs::write(path, text)
            .await
            .map_err(|source| RoomError::SnapshotIo {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), rooms = self.len(), "membership snapshot saved");
        Ok(())
    }
}
