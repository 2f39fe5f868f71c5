use crate::types::{Address, Message, RoomId};
use crate::Result;
use crossbeam_channel::Receiver;

/// A historical query result: the receiver yields each matching message and
/// disconnects once the range is drained.
pub type MessageStream = Receiver<Message>;

/// An open push subscription. Messages arrive on `messages` until
/// [`MessageLog::unsubscribe`] is called with `id`.
pub struct LogSubscription {
    pub id: String,
    pub messages: Receiver<Message>,
}

/// Read/write interface to the remote append-only per-room message log.
///
/// Query methods must return [`Error::NoStorageConfigured`] for rooms that
/// were never assigned history retention; the engine treats that as a normal
/// terminal state. Other failures surface as [`Error::Fetch`].
///
/// On `unsubscribe`, implementations must drop their sending half of the
/// subscription channel so a blocked receiver observes the end of the
/// stream.
///
/// [`Error::NoStorageConfigured`]: crate::Error::NoStorageConfigured
/// [`Error::Fetch`]: crate::Error::Fetch
pub trait MessageLog: Send + Sync {
    /// Appends a message to the room's log. The log assigns the identity
    /// and authoritative timestamp of the returned message.
    fn publish(
        &self,
        room_id: &RoomId,
        sender: &Address,
        payload: &str,
        timestamp: i64,
    ) -> Result<Message>;

    /// Messages with `from <= created_at <= to`, oldest first.
    fn query_range(&self, room_id: &RoomId, from: i64, to: i64) -> Result<MessageStream>;

    /// The most recent `n` messages, oldest first.
    fn query_last(&self, room_id: &RoomId, n: usize) -> Result<MessageStream>;

    fn subscribe(&self, room_id: &RoomId) -> Result<LogSubscription>;

    fn unsubscribe(&self, subscription_id: &str) -> Result<()>;
}
