use crate::log::MessageLog;
use crate::types::{Message, RoomId};
use crate::Result;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pull-style handle over a push subscription to a room's message log.
///
/// Lazy and unbounded: each `next()` blocks until a message arrives or the
/// subscription ends. Not restartable; open a new feed to re-subscribe.
/// Clones share the same subscription, so one flow can block on `next()`
/// while another calls `cancel()`.
///
/// The feed never writes to the cache itself; callers push delivered
/// messages through [`CacheStore::upsert_message`](crate::CacheStore::upsert_message)
/// so live and historical streams converge on one deduplicated view.
#[derive(Clone)]
pub struct LiveFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    log: Arc<dyn MessageLog>,
    subscription_id: String,
    messages: Receiver<Message>,
    cancelled: AtomicBool,
}

impl LiveFeed {
    pub fn open(log: Arc<dyn MessageLog>, room_id: &RoomId) -> Result<Self> {
        let subscription = log.subscribe(room_id)?;
        tracing::debug!(room = %room_id, id = %subscription.id, "live feed opened");
        Ok(Self {
            inner: Arc::new(FeedInner {
                log,
                subscription_id: subscription.id,
                messages: subscription.messages,
                cancelled: AtomicBool::new(false),
            }),
        })
    }

    /// Blocks until the next message, or returns `None` once the feed is
    /// cancelled or the log ends the subscription. The log drops its sender
    /// on unsubscribe, so a `next()` already in flight unblocks with `None`.
    pub fn next(&self) -> Option<Message> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return None;
        }
        self.inner.messages.recv().ok()
    }

    /// Unsubscribes from the underlying push channel. Safe to call from any
    /// flow and more than once.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.inner.log.unsubscribe(&self.inner.subscription_id) {
            tracing::warn!(id = %self.inner.subscription_id, error = %e, "unsubscribe failed");
        }
    }
}

impl Drop for FeedInner {
    fn drop(&mut self) {
        if !self.cancelled.load(Ordering::SeqCst) {
            let _ = self.log.unsubscribe(&self.subscription_id);
        }
    }
}
