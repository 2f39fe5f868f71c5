use nostr::Keys;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Context string used both in the signed message template and as the HKDF
/// salt, so session keys derived for this application never collide with
/// another app's derivation over the same wallet.
pub const SESSION_KEY_CONTEXT: &str = "session-sync";

/// Number of messages fetched by the initial "most recent" resend.
pub const INITIAL_RESEND_COUNT: usize = 20;

pub const DAY_IN_MILLIS: i64 = 86_400_000;

/// Capabilities granted to an invitee. Invite handling waits until the
/// invitee holds exactly this set before trusting the invite notification.
pub const INVITE_CAPABILITIES: [Capability; 2] = [Capability::Grant, Capability::Subscribe];

/// Capabilities of a full room member.
pub const MEMBER_CAPABILITIES: [Capability; 4] = [
    Capability::Publish,
    Capability::Subscribe,
    Capability::Grant,
    Capability::Get,
];

/// Wallet or session account address. Lowercased on construction so address
/// comparisons and cache keys are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Publish,
    Subscribe,
    Grant,
    Get,
}

/// Snapshot of one subject's capabilities in a room, as read from the
/// permission oracle. Never assumed current without an explicit wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub subject: Address,
    pub room_id: RoomId,
    pub capabilities: BTreeSet<Capability>,
}

impl PermissionGrant {
    pub fn new(subject: Address, room_id: RoomId, capabilities: &[Capability]) -> Self {
        Self {
            subject,
            room_id,
            capabilities: capabilities.iter().copied().collect(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn has_exactly(&self, capabilities: &[Capability]) -> bool {
        self.capabilities.len() == capabilities.len()
            && capabilities.iter().all(|c| self.capabilities.contains(c))
    }
}

/// A logged chat message. Immutable once assigned an id and timestamp by the
/// message log; the id is the deduplication key in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub room_id: RoomId,
    pub sender: Address,
    pub payload: String,
    pub created_at: i64,
}

/// Local timezone offset in minutes, with the convention that
/// `utc = local + offset`. Part of the resend marker identity: the same room
/// viewed under different offsets partitions days differently, so markers
/// written under one offset must not suppress fetches under another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimezoneOffset(pub i32);

impl TimezoneOffset {
    pub const UTC: TimezoneOffset = TimezoneOffset(0);

    pub fn millis(self) -> i64 {
        self.0 as i64 * 60_000
    }
}

/// Proof that one calendar day's history for a room has been fully fetched
/// into the local cache. Written only once the day's window has closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendMarker {
    pub owner: Address,
    pub room_id: RoomId,
    pub timezone_offset: TimezoneOffset,
    pub beginning_of_day: i64,
}

/// Secondary signing identity derived from a one-time wallet signature,
/// authorized to publish on behalf of `owner`.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub owner: Address,
    pub keys: Keys,
}

impl SessionIdentity {
    pub fn session_address(&self) -> Address {
        Address::new(hex::encode(self.keys.public_key().to_bytes()))
    }
}

/// The message a wallet is asked to sign when deriving a session key for
/// `owner`. Fixed template: identical signatures yield identical sessions.
pub fn session_key_message(owner: &Address) -> String {
    format!(
        "[{}] This message is for deriving a session key for: {}",
        SESSION_KEY_CONTEXT, owner
    )
}
