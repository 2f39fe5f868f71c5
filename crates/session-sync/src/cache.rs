use crate::storage::StorageAdapter;
use crate::types::{Address, Message, ResendMarker, RoomId, TimezoneOffset};
use crate::Result;
use std::sync::Arc;

const STORAGE_VERSION: &str = "1";

/// Typed view of the local cache: messages deduplicated by id, resend
/// markers deduplicated by (owner, room, timezone offset, day). Records are
/// append-only; a concurrent duplicate write lands identical content.
#[derive(Clone)]
pub struct CacheStore {
    storage: Arc<dyn StorageAdapter>,
}

impl CacheStore {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    fn message_key(&self, owner: &Address, room_id: &RoomId, id: &str) -> String {
        format!(
            "v{}/messages/{}/{}/{}",
            STORAGE_VERSION, owner, room_id, id
        )
    }

    fn message_prefix(&self, owner: &Address, room_id: &RoomId) -> String {
        format!("v{}/messages/{}/{}/", STORAGE_VERSION, owner, room_id)
    }

    fn marker_key(
        &self,
        owner: &Address,
        room_id: &RoomId,
        offset: TimezoneOffset,
        beginning_of_day: i64,
    ) -> String {
        format!(
            "v{}/resends/{}/{}/{}/{}",
            STORAGE_VERSION, owner, room_id, offset.0, beginning_of_day
        )
    }

    /// Stores a message unless an identical id is already cached.
    /// Returns whether the message was newly stored.
    pub fn upsert_message(&self, owner: &Address, message: &Message) -> Result<bool> {
        let key = self.message_key(owner, &message.room_id, &message.id);
        if self.storage.get(&key)?.is_some() {
            return Ok(false);
        }
        self.storage.put(&key, serde_json::to_string(message)?)?;
        Ok(true)
    }

    /// Cached messages for a room, oldest first.
    pub fn messages(&self, owner: &Address, room_id: &RoomId) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .storage
            .scan(&self.message_prefix(owner, room_id))?
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect();
        messages.sort_by_key(|m| (m.created_at, m.id.clone()));
        Ok(messages)
    }

    pub fn record_marker(&self, marker: &ResendMarker) -> Result<()> {
        let key = self.marker_key(
            &marker.owner,
            &marker.room_id,
            marker.timezone_offset,
            marker.beginning_of_day,
        );
        self.storage.put(&key, serde_json::to_string(marker)?)
    }

    pub fn has_marker(
        &self,
        owner: &Address,
        room_id: &RoomId,
        offset: TimezoneOffset,
        beginning_of_day: i64,
    ) -> Result<bool> {
        Ok(self
            .storage
            .get(&self.marker_key(owner, room_id, offset, beginning_of_day))?
            .is_some())
    }
}
