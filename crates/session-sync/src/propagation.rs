use crate::oracle::PermissionOracle;
use crate::types::{Address, Capability, PermissionGrant, RoomId, INVITE_CAPABILITIES};
use crate::{Error, Result};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Polls the permission oracle until `predicate` holds over the room's
/// current grant snapshot, or fails with [`Error::PropagationTimeout`].
///
/// Push-channel invite events tend to fire before the authoritative read
/// path reflects the grant, so any flow reacting to such a notification
/// re-confirms through this wait instead of trusting the payload. A timeout
/// here is expected eventual-consistency lag, not an exceptional condition;
/// the caller decides whether to wait again.
pub fn wait_for_permissions<F>(
    oracle: &dyn PermissionOracle,
    room_id: &RoomId,
    predicate: F,
    options: WaitOptions,
) -> Result<()>
where
    F: Fn(&[PermissionGrant]) -> bool,
{
    let start = Instant::now();
    let mut polls = 0u32;

    loop {
        let grants = oracle.list_grants(room_id)?;
        polls += 1;

        if predicate(&grants) {
            tracing::debug!(room = %room_id, polls, "permission propagated");
            return Ok(());
        }

        if start.elapsed() >= options.timeout {
            tracing::debug!(room = %room_id, polls, "permission wait timed out");
            return Err(Error::PropagationTimeout);
        }

        std::thread::sleep(options.poll_interval);
    }
}

/// Predicate: `subject` holds `capability` in the room.
pub fn holds_capability(
    subject: &Address,
    capability: Capability,
) -> impl Fn(&[PermissionGrant]) -> bool + '_ {
    move |grants| {
        grants
            .iter()
            .any(|g| g.subject == *subject && g.has(capability))
    }
}

/// Predicate for invite acceptance: the invitee holds exactly the invite
/// capability set, nothing more and nothing less.
pub fn invite_established(invitee: &Address) -> impl Fn(&[PermissionGrant]) -> bool + '_ {
    move |grants| {
        grants
            .iter()
            .any(|g| g.subject == *invitee && g.has_exactly(&INVITE_CAPABILITIES))
    }
}
