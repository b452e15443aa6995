//! Vault core: encrypt-then-persist and read-then-decrypt.
//!
//! The vault owns no key material and no UI. It asks the keystore to do the
//! cryptography, moves the resulting record in and out of persistence, and
//! translates backend failures into the bridge taxonomy. The authentication
//! gate surfaces here as `Error::NotAuthenticated`; recovering from it is
//! the re-authentication coordinator's job, not the vault's.

use std::sync::Arc;

use tracing::{debug, warn};

use super::keystore::{Keystore, KeystoreError};
use super::persistence::SecretPersistence;
use crate::error::{Error, Result};

/// A single-slot secret vault over a keystore and a persistence backend.
pub struct Vault {
    keystore: Arc<dyn Keystore>,
    persistence: Arc<dyn SecretPersistence>,
}

impl Vault {
    pub fn new(keystore: Arc<dyn Keystore>, persistence: Arc<dyn SecretPersistence>) -> Self {
        Self {
            keystore,
            persistence,
        }
    }

    /// Encrypt `value` under the named key and persist the record.
    ///
    /// Returns `Ok(false)` when encryption or persistence fails for a
    /// non-auth reason; a record that was encrypted but not persisted is
    /// dropped, not retried. The authentication gate propagates as
    /// `Error::NotAuthenticated` so the caller can challenge and replay.
    pub fn store_secret(&self, key_name: &str, value: &str) -> Result<bool> {
        let record = match self.keystore.encrypt(key_name, value.as_bytes()) {
            Ok(record) => record,
            Err(KeystoreError::NotAuthenticated) => {
                debug!("encrypt under {} gated by authentication window", key_name);
                return Err(Error::NotAuthenticated);
            }
            Err(e) => {
                warn!("failed to encrypt secret under {}: {}", key_name, e);
                return Ok(false);
            }
        };

        if let Err(e) = self.persistence.write(&record) {
            warn!("failed to persist encrypted secret: {}", e);
            return Ok(false);
        }

        debug!("stored secret under key {}", key_name);
        Ok(true)
    }

    /// Read the persisted record and decrypt it with the named key.
    ///
    /// The authentication gate is terminal here: retrieval has no replay
    /// wiring and surfaces `Error::NotAuthenticated` directly.
    pub fn retrieve_secret(&self, key_name: &str) -> Result<String> {
        let record = self
            .persistence
            .read()
            .map_err(|e| Error::PersistenceFailed(e.to_string()))?
            .ok_or(Error::SecretNotFound)?;

        let plaintext = self
            .keystore
            .decrypt(key_name, &record.ciphertext, &record.iv)
            .map_err(|e| match e {
                KeystoreError::NotAuthenticated => Error::NotAuthenticated,
                KeystoreError::KeyNotFound(name) => Error::KeyNotFound(name),
                KeystoreError::CorruptData(msg) => Error::CorruptData(msg),
                KeystoreError::Unavailable(msg) => Error::BackendUnavailable(msg),
                other => Error::DecryptionFailed(other.to_string()),
            })?;

        debug!("retrieved secret under key {}", key_name);
        String::from_utf8(plaintext)
            .map_err(|_| Error::CorruptData("secret is not valid UTF-8".into()))
    }
}
