use crate::log::MessageLog;
use crate::oracle::PermissionOracle;
use crate::types::{session_key_message, Address, Message, RoomId, SessionIdentity};
use crate::utils::{derive_key_material, now_millis};
use crate::{Error, Result};
use nostr::{Keys, SecretKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DELEGATION_CONFIRM_INTERVAL: Duration = Duration::from_millis(500);
const DELEGATION_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// The wallet side of session delegation. One signature per session
/// derivation; the wallet may prompt the user.
pub trait WalletSigner: Send + Sync {
    /// Signs `message` with the owner's primary key, returning the raw
    /// signature bytes. Fails with [`Error::UserDeclined`] on rejection.
    fn sign_message(&self, message: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
enum DerivationOutcome {
    Ready(SessionIdentity),
    Declined,
    OracleUnavailable(String),
    Failed(String),
}

/// Derives, authorizes, and caches one delegated session identity per owner.
///
/// Derivation is deterministic over the wallet signature, but the signature
/// itself costs a wallet prompt, so identities are cached in memory for the
/// process lifetime and concurrent requests for the same owner coalesce into
/// a single in-flight derivation.
pub struct SessionDelegationManager {
    oracle: Arc<dyn PermissionOracle>,
    sessions: Mutex<HashMap<Address, SessionIdentity>>,
    in_flight: Mutex<HashMap<Address, Vec<crossbeam_channel::Sender<DerivationOutcome>>>>,
    confirm_interval: Duration,
    confirm_timeout: Duration,
}

impl SessionDelegationManager {
    pub fn new(oracle: Arc<dyn PermissionOracle>) -> Self {
        Self {
            oracle,
            sessions: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            confirm_interval: DELEGATION_CONFIRM_INTERVAL,
            confirm_timeout: DELEGATION_CONFIRM_TIMEOUT,
        }
    }

    /// Overrides how long and how often `ensure_authorized` polls for an
    /// accepted delegation write to land on the oracle's read path.
    pub fn with_confirmation(mut self, interval: Duration, timeout: Duration) -> Self {
        self.confirm_interval = interval;
        self.confirm_timeout = timeout;
        self
    }

    /// The cached identity for `owner`, if one has been derived.
    pub fn current_session(&self, owner: &Address) -> Option<SessionIdentity> {
        self.sessions.lock().unwrap().get(owner).cloned()
    }

    /// Drops the cached identity for `owner`. Called on wallet disconnect;
    /// re-derivation is idempotent, so nothing else needs tearing down.
    pub fn invalidate(&self, owner: &Address) {
        self.sessions.lock().unwrap().remove(owner);
    }

    /// Returns the cached identity for `owner`, or derives and authorizes a
    /// new one. Concurrent callers for the same owner share one derivation
    /// and one wallet prompt; on any failure the previously cached identity
    /// (if one existed) is left intact.
    pub fn get_or_create_session(
        &self,
        owner: &Address,
        signer: &dyn WalletSigner,
    ) -> Result<SessionIdentity> {
        if let Some(identity) = self.current_session(owner) {
            return Ok(identity);
        }

        let waiter = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get_mut(owner) {
                Some(waiters) => {
                    let (tx, rx) = crossbeam_channel::bounded(1);
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    in_flight.insert(owner.clone(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return match rx.recv() {
                Ok(DerivationOutcome::Ready(identity)) => Ok(identity),
                Ok(DerivationOutcome::Declined) => Err(Error::UserDeclined),
                Ok(DerivationOutcome::OracleUnavailable(msg)) => Err(Error::OracleUnavailable(msg)),
                Ok(DerivationOutcome::Failed(msg)) => Err(Error::AuthorizationFailed(msg)),
                Err(_) => Err(Error::AuthorizationFailed(
                    "derivation aborted".to_string(),
                )),
            };
        }

        // A previous leader may have finished between the cache check and
        // the leadership claim; its identity is already current.
        let result = match self.current_session(owner) {
            Some(identity) => Ok(identity),
            None => self.derive_and_authorize(owner, signer),
        };

        let outcome = match &result {
            Ok(identity) => {
                self.sessions
                    .lock()
                    .unwrap()
                    .insert(owner.clone(), identity.clone());
                DerivationOutcome::Ready(identity.clone())
            }
            Err(Error::UserDeclined) => DerivationOutcome::Declined,
            Err(Error::OracleUnavailable(msg)) => DerivationOutcome::OracleUnavailable(msg.clone()),
            Err(e) => DerivationOutcome::Failed(e.to_string()),
        };

        let waiters = self
            .in_flight
            .lock()
            .unwrap()
            .remove(owner)
            .unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        result
    }

    fn derive_and_authorize(
        &self,
        owner: &Address,
        signer: &dyn WalletSigner,
    ) -> Result<SessionIdentity> {
        let identity = self.derive_session_key(owner, signer)?;
        self.ensure_authorized(owner, &identity)?;
        tracing::debug!(owner = %owner, session = %identity.session_address(), "session ready");
        Ok(identity)
    }

    /// Asks the wallet for a signature over the fixed owner-scoped template
    /// and turns it into a session keypair. Deterministic for identical
    /// signatures.
    pub fn derive_session_key(
        &self,
        owner: &Address,
        signer: &dyn WalletSigner,
    ) -> Result<SessionIdentity> {
        let signature = signer.sign_message(&session_key_message(owner))?;
        let okm = derive_key_material(&signature);
        let secret = SecretKey::from_slice(&okm)?;
        Ok(SessionIdentity {
            owner: owner.clone(),
            keys: Keys::new(secret),
        })
    }

    /// Makes sure the session address holds delegated authority from
    /// `owner`, submitting the authorization if missing and polling until
    /// the write is visible on the oracle's read path. Idempotent.
    pub fn ensure_authorized(&self, owner: &Address, identity: &SessionIdentity) -> Result<()> {
        let delegate = identity.session_address();

        if self.oracle.is_delegation_authorized(owner, &delegate)? {
            return Ok(());
        }

        tracing::debug!(owner = %owner, delegate = %delegate, "authorizing delegation");
        self.oracle.authorize_delegation(owner, &delegate)?;

        let start = Instant::now();
        loop {
            if self.oracle.is_delegation_authorized(owner, &delegate)? {
                return Ok(());
            }
            if start.elapsed() >= self.confirm_timeout {
                return Err(Error::AuthorizationFailed(
                    "delegation not visible before deadline".to_string(),
                ));
            }
            std::thread::sleep(self.confirm_interval);
        }
    }
}

/// Publishes a message through the delegated session, with the current
/// wall-clock time as the requested timestamp. No wallet prompt involved.
pub fn publish_as_session(
    log: &dyn MessageLog,
    identity: &SessionIdentity,
    room_id: &RoomId,
    payload: &str,
) -> Result<Message> {
    log.publish(room_id, &identity.session_address(), payload, now_millis())
}
