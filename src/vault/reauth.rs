//! Re-authentication: one-shot credential challenges and the retry protocol.
//!
//! A challenge is a registered completion handle correlated by an integer
//! request code: register exactly one, resolve it exactly once, deregister.
//! The coordinator owns the store-path protocol — when an encrypt attempt
//! reports the authentication gate, it presents one credential challenge
//! and replays the original call exactly once after a grant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::core::Vault;
use super::host::CredentialHost;
use crate::error::{Error, Result};

/// Request code for "authenticate so the key can encrypt".
pub const ENCRYPT_AUTH_REQUEST_CODE: u32 = 1;

/// Request code for the set-credential settings flow.
pub const SET_CREDENTIAL_REQUEST_CODE: u32 = 3;

/// Registry of outstanding credential challenges.
///
/// At most one challenge per request code. A sender is removed from the
/// registry before it fires, so each handle resolves at most once; resolving
/// an unknown code is a no-op.
#[derive(Default)]
pub struct ChallengeBroker {
    pending: Mutex<HashMap<u32, oneshot::Sender<bool>>>,
}

impl ChallengeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a challenge under `request_code` and hand back the
    /// receiving end of its completion handle.
    pub fn register(&self, request_code: u32) -> Result<oneshot::Receiver<bool>> {
        let mut pending = self.guard();
        if pending.contains_key(&request_code) {
            warn!("challenge {} already outstanding", request_code);
            return Err(Error::ChallengePending(request_code));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(request_code, tx);
        debug!("registered challenge {}", request_code);
        Ok(rx)
    }

    /// Deliver the host UI's result for `request_code`. Returns whether a
    /// challenge was actually waiting for it.
    pub fn resolve(&self, request_code: u32, granted: bool) -> bool {
        let Some(tx) = self.guard().remove(&request_code) else {
            debug!("no challenge registered for {}, ignoring result", request_code);
            return false;
        };
        debug!("challenge {} resolved: granted={}", request_code, granted);
        // A dropped receiver means the awaiting side already gave up;
        // nothing left to notify.
        tx.send(granted).is_ok()
    }

    /// Drop a challenge without resolving it (e.g. the flow could not be
    /// launched after registration).
    pub fn unregister(&self, request_code: u32) {
        if self.guard().remove(&request_code).is_some() {
            debug!("unregistered challenge {}", request_code);
        }
    }

    /// Resolve every outstanding challenge as denied. Called when the host
    /// environment is torn down so no continuation dangles.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.guard().drain().collect();
        if !drained.is_empty() {
            info!("cancelling {} outstanding challenge(s)", drained.len());
        }
        for (code, tx) in drained {
            debug!("challenge {} cancelled", code);
            let _ = tx.send(false);
        }
    }

    /// Whether a challenge is outstanding for `request_code`.
    pub fn has_pending(&self, request_code: u32) -> bool {
        self.guard().contains_key(&request_code)
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, HashMap<u32, oneshot::Sender<bool>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives the challenge-then-replay protocol for the store path.
pub struct ReauthCoordinator {
    host: Arc<dyn CredentialHost>,
    broker: Arc<ChallengeBroker>,
}

impl ReauthCoordinator {
    pub fn new(host: Arc<dyn CredentialHost>, broker: Arc<ChallengeBroker>) -> Self {
        Self { host, broker }
    }

    /// Store a secret, recovering from the authentication gate once.
    ///
    /// A gated first attempt triggers a credential challenge; after a grant
    /// the original call is replayed with identical arguments exactly once.
    /// A replay that is gated again, a denied challenge, and a challenge
    /// that cannot be presented are all terminal.
    pub async fn store_secret(&self, vault: &Vault, key_name: &str, value: &str) -> Result<bool> {
        match vault.store_secret(key_name, value) {
            Err(Error::NotAuthenticated) => {}
            outcome => return outcome,
        }

        info!("store gated by authentication window, challenging user");
        if !self.authenticate(ENCRYPT_AUTH_REQUEST_CODE).await? {
            info!("user rejected the credential challenge");
            return Err(Error::UserNotAuthenticated);
        }

        match vault.store_secret(key_name, value) {
            // Still gated after a granted challenge: do not loop.
            Err(Error::NotAuthenticated) => {
                warn!("store still gated after re-authentication");
                Err(Error::UserNotAuthenticated)
            }
            outcome => outcome,
        }
    }

    /// Run one credential challenge and await its outcome.
    async fn authenticate(&self, request_code: u32) -> Result<bool> {
        let rx = self.broker.register(request_code)?;

        if !self.host.present_credential_challenge(request_code) {
            warn!("no foreground context to present challenge {}", request_code);
            self.broker.unregister(request_code);
            return Err(Error::UserNotAuthenticated);
        }

        match rx.await {
            Ok(granted) => Ok(granted),
            // Sender dropped without a result: host torn down mid-challenge.
            Err(_) => Err(Error::UserNotAuthenticated),
        }
    }
}
