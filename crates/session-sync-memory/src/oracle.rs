use session_sync::{Address, Capability, PermissionGrant, PermissionOracle, Result, RoomId};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

struct PendingGrant {
    room_id: RoomId,
    subject: Address,
    capabilities: BTreeSet<Capability>,
    remaining_reads: usize,
}

struct PendingDelegation {
    owner: Address,
    delegate: Address,
    remaining_reads: usize,
}

#[derive(Default)]
struct OracleInner {
    grants: HashMap<RoomId, Vec<PermissionGrant>>,
    pending_grants: Vec<PendingGrant>,
    delegations: HashSet<(Address, Address)>,
    pending_delegations: Vec<PendingDelegation>,
}

/// Permission store held in memory, with configurable write-visibility lag:
/// with a lag of `n`, an accepted write only shows up on the read path after
/// `n` further reads of that path. Lag 0 behaves like a strongly consistent
/// store.
#[derive(Default)]
pub struct MemoryPermissionOracle {
    inner: Mutex<OracleInner>,
    lag_reads: usize,
}

impl MemoryPermissionOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_propagation_lag(lag_reads: usize) -> Self {
        Self {
            inner: Mutex::new(OracleInner::default()),
            lag_reads,
        }
    }

    fn apply_grant(
        grants: &mut HashMap<RoomId, Vec<PermissionGrant>>,
        room_id: &RoomId,
        subject: &Address,
        capabilities: &BTreeSet<Capability>,
    ) {
        let room_grants = grants.entry(room_id.clone()).or_default();
        match room_grants.iter_mut().find(|g| g.subject == *subject) {
            Some(existing) => existing.capabilities.extend(capabilities.iter().copied()),
            None => room_grants.push(PermissionGrant {
                subject: subject.clone(),
                room_id: room_id.clone(),
                capabilities: capabilities.clone(),
            }),
        }
    }
}

impl PermissionOracle for MemoryPermissionOracle {
    fn list_grants(&self, room_id: &RoomId) -> Result<Vec<PermissionGrant>> {
        let mut inner = self.inner.lock().unwrap();

        let mut promoted = Vec::new();
        for pending in &mut inner.pending_grants {
            if pending.room_id != *room_id {
                continue;
            }
            if pending.remaining_reads > 0 {
                pending.remaining_reads -= 1;
            }
            if pending.remaining_reads == 0 {
                promoted.push((pending.subject.clone(), pending.capabilities.clone()));
            }
        }
        inner
            .pending_grants
            .retain(|p| p.room_id != *room_id || p.remaining_reads > 0);
        for (subject, capabilities) in promoted {
            Self::apply_grant(&mut inner.grants, room_id, &subject, &capabilities);
        }

        Ok(inner.grants.get(room_id).cloned().unwrap_or_default())
    }

    fn grant(
        &self,
        room_id: &RoomId,
        subject: &Address,
        capabilities: &[Capability],
    ) -> Result<()> {
        let capabilities: BTreeSet<Capability> = capabilities.iter().copied().collect();
        let mut inner = self.inner.lock().unwrap();
        if self.lag_reads == 0 {
            Self::apply_grant(&mut inner.grants, room_id, subject, &capabilities);
        } else {
            inner.pending_grants.push(PendingGrant {
                room_id: room_id.clone(),
                subject: subject.clone(),
                capabilities,
                remaining_reads: self.lag_reads,
            });
        }
        Ok(())
    }

    fn revoke(&self, room_id: &RoomId, subject: &Address) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(room_grants) = inner.grants.get_mut(room_id) {
            room_grants.retain(|g| g.subject != *subject);
        }
        inner
            .pending_grants
            .retain(|p| p.room_id != *room_id || p.subject != *subject);
        Ok(())
    }

    fn is_delegation_authorized(&self, owner: &Address, delegate: &Address) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();

        let mut promoted = false;
        for pending in &mut inner.pending_delegations {
            if pending.owner != *owner || pending.delegate != *delegate {
                continue;
            }
            if pending.remaining_reads > 0 {
                pending.remaining_reads -= 1;
            }
            if pending.remaining_reads == 0 {
                promoted = true;
            }
        }
        if promoted {
            inner
                .pending_delegations
                .retain(|p| p.remaining_reads > 0);
            inner.delegations.insert((owner.clone(), delegate.clone()));
        }

        Ok(inner
            .delegations
            .contains(&(owner.clone(), delegate.clone())))
    }

    fn authorize_delegation(&self, owner: &Address, delegate: &Address) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if self.lag_reads == 0 {
            inner.delegations.insert((owner.clone(), delegate.clone()));
        } else {
            inner.pending_delegations.push(PendingDelegation {
                owner: owner.clone(),
                delegate: delegate.clone(),
                remaining_reads: self.lag_reads,
            });
        }
        Ok(())
    }
}
