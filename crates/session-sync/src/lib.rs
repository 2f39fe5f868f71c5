//! Delegated session synchronization for pub/sub chat rooms.
//!
//! Lets a client publish into a room without signing every message with the
//! primary wallet: a secondary session keypair is derived from a one-time
//! wallet signature, authorized through an eventually-consistent permission
//! store, and used for ongoing traffic. The rest of the crate keeps a local
//! message cache consistent with the remote append-only log: day-by-day
//! historical catch-up with resend markers, plus a cancellable live feed.
//!
//! The network boundaries ([`PermissionOracle`], [`MessageLog`],
//! [`WalletSigner`]) and the durable cache ([`StorageAdapter`]) are traits;
//! `session-sync-memory` ships in-process implementations.

pub mod cache;
pub mod error;
pub mod live;
pub mod log;
pub mod oracle;
pub mod propagation;
pub mod resend;
pub mod session;
pub mod storage;
pub mod types;
pub mod utils;

pub use cache::CacheStore;
pub use error::{Error, Result};
pub use live::LiveFeed;
pub use log::{LogSubscription, MessageLog, MessageStream};
pub use oracle::PermissionOracle;
pub use propagation::{holds_capability, invite_established, wait_for_permissions, WaitOptions};
pub use resend::{CancelToken, ResendEngine, ResendJob, ResendQueue, ResendTarget, SyncReport};
pub use session::{publish_as_session, SessionDelegationManager, WalletSigner};
pub use storage::{FileStorage, MemoryStorage, StorageAdapter};
pub use types::{
    session_key_message, Address, Capability, Message, PermissionGrant, ResendMarker, RoomId,
    SessionIdentity, TimezoneOffset, DAY_IN_MILLIS, INITIAL_RESEND_COUNT, INVITE_CAPABILITIES,
    MEMBER_CAPABILITIES, SESSION_KEY_CONTEXT,
};
pub use utils::{beginning_of_day, end_of_day, now_millis};
