use crate::cache::CacheStore;
use crate::log::MessageLog;
use crate::types::{
    Address, ResendMarker, RoomId, TimezoneOffset, DAY_IN_MILLIS, INITIAL_RESEND_COUNT,
};
use crate::utils::{beginning_of_day, end_of_day, now_millis};
use crate::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What a sync should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResendTarget {
    /// The most recent messages, regardless of day. Used on first entry to
    /// a room; completion schedules a catch-up for the preceding day.
    Latest,
    /// The full local calendar day containing the timestamp.
    Day(i64),
    /// A single point in time. No marker, no follow-up.
    Exact(i64),
}

/// Cooperative cancellation for a sync in flight. Cancelling stops further
/// cache writes, so a fetch that answers after the caller left a room does
/// not keep growing the cache.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One scheduled historical fetch.
#[derive(Debug, Clone)]
pub struct ResendJob {
    pub room_id: RoomId,
    pub requester: Address,
    pub timezone_offset: TimezoneOffset,
    pub target: ResendTarget,
}

/// FIFO of pending resend jobs. Completing a `Latest` fetch pushes the
/// previous day's job here instead of dispatching it recursively, so
/// scheduling can be observed and tested on its own.
#[derive(Clone, Default)]
pub struct ResendQueue {
    jobs: Arc<Mutex<VecDeque<ResendJob>>>,
}

impl ResendQueue {
    pub fn push(&self, job: ResendJob) {
        self.jobs.lock().unwrap().push_back(job);
    }

    pub fn pop(&self) -> Option<ResendJob> {
        self.jobs.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }
}

/// Outcome of one sync invocation. Exactly one of these per call; the
/// engine never retries on its own.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Messages the log returned for the queried range.
    pub received: usize,
    /// Messages newly written to the cache (received minus duplicates).
    pub stored: usize,
    /// Earliest `created_at` observed in this fetch.
    pub min_created_at: Option<i64>,
    /// The day was already marked complete; no query was issued.
    pub skipped: bool,
    /// The room has no history retention; terminal, not an error.
    pub storage_missing: bool,
    /// The token was cancelled mid-drain; cache writes stopped.
    pub cancelled: bool,
    /// A resend marker was recorded for the fetched day.
    pub marker_written: bool,
}

/// Reconciles the local cache against the remote log, one day window at a
/// time, walking backward on demand.
pub struct ResendEngine {
    cache: CacheStore,
    log: Arc<dyn MessageLog>,
    queue: ResendQueue,
}

impl ResendEngine {
    pub fn new(cache: CacheStore, log: Arc<dyn MessageLog>) -> Self {
        Self {
            cache,
            log,
            queue: ResendQueue::default(),
        }
    }

    pub fn queue(&self) -> &ResendQueue {
        &self.queue
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Brings the cache up to date for one target range. Day targets whose
    /// marker exists skip the network entirely; day targets whose window
    /// has closed get a marker once the fetch drains. "Today" is never
    /// marked: it is still being appended to.
    pub fn sync_room(
        &self,
        room_id: &RoomId,
        requester: &Address,
        timezone_offset: TimezoneOffset,
        target: ResendTarget,
        cancel: &CancelToken,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        if let ResendTarget::Day(ts) = target {
            let bod = beginning_of_day(ts, timezone_offset);
            if self
                .cache
                .has_marker(requester, room_id, timezone_offset, bod)?
            {
                tracing::debug!(room = %room_id, bod, "day already fetched, skipping");
                report.skipped = true;
                return Ok(report);
            }
        }

        let stream = match target {
            ResendTarget::Latest => self.log.query_last(room_id, INITIAL_RESEND_COUNT),
            ResendTarget::Exact(ts) => self.log.query_range(room_id, ts, ts),
            ResendTarget::Day(ts) => {
                let bod = beginning_of_day(ts, timezone_offset);
                self.log.query_range(room_id, bod, bod + DAY_IN_MILLIS - 1)
            }
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(Error::NoStorageConfigured) => {
                tracing::debug!(room = %room_id, "room has no storage, nothing to fetch");
                report.storage_missing = true;
                return Ok(report);
            }
            Err(e) => {
                tracing::warn!(room = %room_id, error = %e, "historical fetch failed");
                return Err(e);
            }
        };

        for message in stream.iter() {
            if cancel.is_cancelled() {
                break;
            }
            if self.cache.upsert_message(requester, &message)? {
                report.stored += 1;
            }
            report.received += 1;
            report.min_created_at = Some(
                report
                    .min_created_at
                    .map_or(message.created_at, |min| min.min(message.created_at)),
            );
        }

        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        match target {
            ResendTarget::Exact(_) => {}
            ResendTarget::Day(ts) => {
                // Record the day as complete only once its window has
                // closed; otherwise later messages from the same day would
                // be hidden forever.
                if end_of_day(ts, timezone_offset)
                    < beginning_of_day(now_millis(), timezone_offset)
                {
                    let bod = beginning_of_day(ts, timezone_offset);
                    self.cache.record_marker(&ResendMarker {
                        owner: requester.clone(),
                        room_id: room_id.clone(),
                        timezone_offset,
                        beginning_of_day: bod,
                    })?;
                    tracing::debug!(room = %room_id, bod, "day marked complete");
                    report.marker_written = true;
                }
            }
            ResendTarget::Latest => {
                if let Some(min) = report.min_created_at {
                    let previous_day = beginning_of_day(min, timezone_offset) - 1;
                    self.queue.push(ResendJob {
                        room_id: room_id.clone(),
                        requester: requester.clone(),
                        timezone_offset,
                        target: ResendTarget::Day(previous_day),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Runs queued jobs until the queue is empty or the token cancels.
    /// Returns how many jobs ran. A failing job leaves the rest queued.
    pub fn run_pending(&self, cancel: &CancelToken) -> Result<usize> {
        let mut ran = 0;
        while let Some(job) = self.queue.pop() {
            if cancel.is_cancelled() {
                self.queue.push(job);
                break;
            }
            self.sync_room(
                &job.room_id,
                &job.requester,
                job.timezone_offset,
                job.target,
                cancel,
            )?;
            ran += 1;
        }
        Ok(ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogSubscription, MessageStream};
    use crate::storage::MemoryStorage;
    use crate::types::Message;
    use std::sync::atomic::AtomicUsize;

    struct FakeLog {
        messages: Vec<Message>,
        storage_configured: bool,
        queries: AtomicUsize,
    }

    impl FakeLog {
        fn new(messages: Vec<Message>) -> Self {
            Self {
                messages,
                storage_configured: true,
                queries: AtomicUsize::new(0),
            }
        }

        fn without_storage() -> Self {
            Self {
                messages: Vec::new(),
                storage_configured: false,
                queries: AtomicUsize::new(0),
            }
        }

        fn stream(&self, messages: Vec<Message>) -> Result<MessageStream> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if !self.storage_configured {
                return Err(Error::NoStorageConfigured);
            }
            let (tx, rx) = crossbeam_channel::unbounded();
            for message in messages {
                tx.send(message).unwrap();
            }
            Ok(rx)
        }
    }

    impl MessageLog for FakeLog {
        fn publish(
            &self,
            _room_id: &RoomId,
            _sender: &Address,
            _payload: &str,
            _timestamp: i64,
        ) -> Result<Message> {
            unreachable!("unit tests never publish")
        }

        fn query_range(&self, _room_id: &RoomId, from: i64, to: i64) -> Result<MessageStream> {
            let matching = self
                .messages
                .iter()
                .filter(|m| m.created_at >= from && m.created_at <= to)
                .cloned()
                .collect();
            self.stream(matching)
        }

        fn query_last(&self, _room_id: &RoomId, n: usize) -> Result<MessageStream> {
            let mut sorted = self.messages.clone();
            sorted.sort_by_key(|m| m.created_at);
            let skip = sorted.len().saturating_sub(n);
            self.stream(sorted.into_iter().skip(skip).collect())
        }

        fn subscribe(&self, _room_id: &RoomId) -> Result<LogSubscription> {
            let (_tx, rx) = crossbeam_channel::unbounded::<Message>();
            Ok(LogSubscription {
                id: "fake".to_string(),
                messages: rx,
            })
        }

        fn unsubscribe(&self, _subscription_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn message(id: &str, created_at: i64) -> Message {
        Message {
            id: id.to_string(),
            room_id: RoomId::new("room-1"),
            sender: Address::new("0xsender"),
            payload: "hi".to_string(),
            created_at,
        }
    }

    fn engine(log: Arc<FakeLog>) -> ResendEngine {
        ResendEngine::new(CacheStore::new(Arc::new(MemoryStorage::new())), log)
    }

    #[test]
    fn queue_is_fifo() {
        let queue = ResendQueue::default();
        for ts in [1, 2, 3] {
            queue.push(ResendJob {
                room_id: RoomId::new("room-1"),
                requester: Address::new("0xme"),
                timezone_offset: TimezoneOffset::UTC,
                target: ResendTarget::Day(ts),
            });
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().target, ResendTarget::Day(1));
        assert_eq!(queue.pop().unwrap().target, ResendTarget::Day(2));
        assert_eq!(queue.pop().unwrap().target, ResendTarget::Day(3));
        assert!(queue.is_empty());
    }

    #[test]
    fn marked_day_skips_the_network() {
        let yesterday = now_millis() - DAY_IN_MILLIS;
        let log = Arc::new(FakeLog::new(vec![message("m-1", yesterday)]));
        let engine = engine(log.clone());
        let room = RoomId::new("room-1");
        let me = Address::new("0xme");
        let cancel = CancelToken::new();

        let first = engine
            .sync_room(
                &room,
                &me,
                TimezoneOffset::UTC,
                ResendTarget::Day(yesterday),
                &cancel,
            )
            .unwrap();
        assert!(first.marker_written);
        assert_eq!(log.queries.load(Ordering::SeqCst), 1);

        let second = engine
            .sync_room(
                &room,
                &me,
                TimezoneOffset::UTC,
                ResendTarget::Day(yesterday),
                &cancel,
            )
            .unwrap();
        assert!(second.skipped);
        assert_eq!(log.queries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn today_is_never_marked() {
        let now = now_millis();
        let log = Arc::new(FakeLog::new(vec![message("m-1", now)]));
        let engine = engine(log);
        let cancel = CancelToken::new();

        let report = engine
            .sync_room(
                &RoomId::new("room-1"),
                &Address::new("0xme"),
                TimezoneOffset::UTC,
                ResendTarget::Day(now),
                &cancel,
            )
            .unwrap();

        assert_eq!(report.received, 1);
        assert!(!report.marker_written);
    }

    #[test]
    fn missing_storage_is_terminal_and_quiet() {
        let engine = engine(Arc::new(FakeLog::without_storage()));
        let cancel = CancelToken::new();

        let report = engine
            .sync_room(
                &RoomId::new("room-1"),
                &Address::new("0xme"),
                TimezoneOffset::UTC,
                ResendTarget::Latest,
                &cancel,
            )
            .unwrap();

        assert!(report.storage_missing);
        assert!(!report.marker_written);
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn latest_fetch_schedules_the_previous_day() {
        let now = now_millis();
        let earliest = now - 3_600_000;
        let log = Arc::new(FakeLog::new(vec![
            message("m-1", earliest),
            message("m-2", now),
        ]));
        let engine = engine(log);
        let cancel = CancelToken::new();

        let report = engine
            .sync_room(
                &RoomId::new("room-1"),
                &Address::new("0xme"),
                TimezoneOffset::UTC,
                ResendTarget::Latest,
                &cancel,
            )
            .unwrap();
        assert_eq!(report.min_created_at, Some(earliest));

        let job = engine.queue().pop().unwrap();
        let expected = beginning_of_day(earliest, TimezoneOffset::UTC) - 1;
        assert_eq!(job.target, ResendTarget::Day(expected));
        assert_eq!(
            beginning_of_day(expected, TimezoneOffset::UTC) + DAY_IN_MILLIS,
            beginning_of_day(earliest, TimezoneOffset::UTC)
        );
    }

    #[test]
    fn cancelled_sync_writes_nothing() {
        let yesterday = now_millis() - DAY_IN_MILLIS;
        let log = Arc::new(FakeLog::new(vec![message("m-1", yesterday)]));
        let engine = engine(log);
        let room = RoomId::new("room-1");
        let me = Address::new("0xme");

        let cancel = CancelToken::new();
        cancel.cancel();

        let report = engine
            .sync_room(
                &room,
                &me,
                TimezoneOffset::UTC,
                ResendTarget::Day(yesterday),
                &cancel,
            )
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.stored, 0);
        assert!(!report.marker_written);
        assert!(engine.cache().messages(&me, &room).unwrap().is_empty());
    }

    #[test]
    fn exact_target_writes_no_marker_and_schedules_nothing() {
        let yesterday = now_millis() - DAY_IN_MILLIS;
        let log = Arc::new(FakeLog::new(vec![message("m-1", yesterday)]));
        let engine = engine(log);
        let cancel = CancelToken::new();

        let report = engine
            .sync_room(
                &RoomId::new("room-1"),
                &Address::new("0xme"),
                TimezoneOffset::UTC,
                ResendTarget::Exact(yesterday),
                &cancel,
            )
            .unwrap();

        assert_eq!(report.received, 1);
        assert!(!report.marker_written);
        assert!(engine.queue().is_empty());
    }
}
