use crate::types::{Address, Capability, PermissionGrant, RoomId};
use crate::Result;

/// Read/write interface to the eventually-consistent permission store and
/// the delegation registry binding session accounts to owners.
///
/// Write visibility lag is normal: a grant accepted by `grant` or
/// `authorize_delegation` may take a while to show up on the read path.
/// Callers that need to act on a write go through
/// [`wait_for_permissions`](crate::propagation::wait_for_permissions) rather
/// than trusting a notification.
///
/// Implementations should return [`Error::OracleUnavailable`] when the read
/// path is unreachable and [`Error::AuthorizationFailed`] for failed writes.
///
/// [`Error::OracleUnavailable`]: crate::Error::OracleUnavailable
/// [`Error::AuthorizationFailed`]: crate::Error::AuthorizationFailed
pub trait PermissionOracle: Send + Sync {
    /// Current grant snapshot for a room. Never assumed current.
    fn list_grants(&self, room_id: &RoomId) -> Result<Vec<PermissionGrant>>;

    fn grant(&self, room_id: &RoomId, subject: &Address, capabilities: &[Capability])
        -> Result<()>;

    fn revoke(&self, room_id: &RoomId, subject: &Address) -> Result<()>;

    /// Whether `delegate` already holds delegated authority from `owner`.
    fn is_delegation_authorized(&self, owner: &Address, delegate: &Address) -> Result<bool>;

    /// Binds `delegate` to `owner`. The write is accepted, not necessarily
    /// visible; callers confirm via `is_delegation_authorized`.
    fn authorize_delegation(&self, owner: &Address, delegate: &Address) -> Result<()>;
}
