use crossbeam_channel::Sender;
use session_sync::{Address, Error, LogSubscription, Message, MessageLog, MessageStream, Result, RoomId};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct RoomLog {
    messages: Vec<Message>,
    storage_enabled: bool,
}

#[derive(Default)]
struct LogInner {
    rooms: HashMap<RoomId, RoomLog>,
    subscribers: HashMap<String, (RoomId, Sender<Message>)>,
}

/// Append-only per-room message log held in memory.
///
/// Rooms retain history only once [`assign_storage`](Self::assign_storage)
/// is called; live delivery works either way, and historical queries against
/// an unassigned room fail with [`Error::NoStorageConfigured`], mirroring a
/// log network where storage nodes are opt-in per room.
#[derive(Default)]
pub struct MemoryMessageLog {
    inner: Mutex<LogInner>,
}

impl MemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables history retention for a room.
    pub fn assign_storage(&self, room_id: &RoomId) {
        self.inner
            .lock()
            .unwrap()
            .rooms
            .entry(room_id.clone())
            .or_default()
            .storage_enabled = true;
    }

    fn drained_stream(messages: Vec<Message>) -> MessageStream {
        let (tx, rx) = crossbeam_channel::unbounded();
        for message in messages {
            let _ = tx.send(message);
        }
        // Dropping the sender ends the stream once drained.
        rx
    }

    fn stored_messages(&self, room_id: &RoomId) -> Result<Vec<Message>> {
        let inner = self.inner.lock().unwrap();
        let room = inner.rooms.get(room_id);
        match room {
            Some(room) if room.storage_enabled => {
                let mut messages = room.messages.clone();
                messages.sort_by_key(|m| (m.created_at, m.id.clone()));
                Ok(messages)
            }
            _ => Err(Error::NoStorageConfigured),
        }
    }
}

impl MessageLog for MemoryMessageLog {
    fn publish(
        &self,
        room_id: &RoomId,
        sender: &Address,
        payload: &str,
        timestamp: i64,
    ) -> Result<Message> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: room_id.clone(),
            sender: sender.clone(),
            payload: payload.to_string(),
            created_at: timestamp,
        };

        let mut inner = self.inner.lock().unwrap();
        let room = inner.rooms.entry(room_id.clone()).or_default();
        if room.storage_enabled {
            room.messages.push(message.clone());
        }

        // Fan out to live subscribers, dropping any whose receiver is gone.
        inner.subscribers.retain(|_, (sub_room, tx)| {
            if sub_room != room_id {
                return true;
            }
            tx.send(message.clone()).is_ok()
        });

        Ok(message)
    }

    fn query_range(&self, room_id: &RoomId, from: i64, to: i64) -> Result<MessageStream> {
        let messages = self
            .stored_messages(room_id)?
            .into_iter()
            .filter(|m| m.created_at >= from && m.created_at <= to)
            .collect();
        Ok(Self::drained_stream(messages))
    }

    fn query_last(&self, room_id: &RoomId, n: usize) -> Result<MessageStream> {
        let messages = self.stored_messages(room_id)?;
        let skip = messages.len().saturating_sub(n);
        Ok(Self::drained_stream(messages.into_iter().skip(skip).collect()))
    }

    fn subscribe(&self, room_id: &RoomId) -> Result<LogSubscription> {
        let id = format!("sub-{}", uuid::Uuid::new_v4());
        let (tx, rx) = crossbeam_channel::unbounded();
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .insert(id.clone(), (room_id.clone(), tx));
        Ok(LogSubscription { id, messages: rx })
    }

    fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        // Removing the entry drops the sender; blocked receivers observe
        // the end of the stream.
        self.inner.lock().unwrap().subscribers.remove(subscription_id);
        Ok(())
    }
}
