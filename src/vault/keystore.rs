//! Authentication-gated symmetric keystore abstraction.
//!
//! This module defines:
//! - `Keystore`: the capability trait the vault core encrypts/decrypts through
//! - `KeystoreError`: the backend failure taxonomy
//! - `AuthWindow`: tracks how recently the user authenticated
//! - `SoftwareKeystore`: an in-memory implementation honoring the same
//!   authentication-window contract as the hardware-backed ones
//!
//! The gate is enforced by the backend at operation time: callers never ask
//! "am I authenticated?", they attempt the operation and learn of the gate
//! via `KeystoreError::NotAuthenticated`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Nonce size for AES-GCM (96 bits = 12 bytes). Serves as the record IV.
pub(crate) const IV_SIZE: usize = 12;

/// Key material size for AES-256.
pub(crate) const KEY_SIZE: usize = 32;

/// Failures reported by a keystore backend.
#[derive(Error, Debug)]
pub enum KeystoreError {
    /// The user has not authenticated within the key's validity window.
    /// This is the signal that drives the re-authentication flow.
    #[error("user has not authenticated within the key's validity window")]
    NotAuthenticated,

    /// No key with the given name exists in the backend.
    #[error("no key named {0}")]
    KeyNotFound(String),

    /// The cryptographic provider failed to encrypt.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Ciphertext or IV failed validation during decryption.
    #[error("ciphertext failed validation: {0}")]
    CorruptData(String),

    /// The backend itself cannot be reached.
    #[error("keystore unavailable: {0}")]
    Unavailable(String),
}

/// Parameters fixed at key-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyParams {
    /// Seconds since the last user authentication during which the key
    /// may be used. Zero means the key is never usable without an
    /// immediately preceding challenge.
    pub auth_validity_secs: u32,
    /// Whether enrolling a new biometric invalidates the key.
    pub invalidate_on_biometric_enrollment: bool,
}

/// A ciphertext together with the IV that produced it.
///
/// The two are always written, read and transported together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedSecret {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Authentication-gated symmetric keystore.
///
/// Key material is owned by the implementation and never crosses this
/// interface in plaintext form.
pub trait Keystore: Send + Sync {
    /// Whether a key with this name exists. An unreachable backend counts
    /// as `false`, never as an error.
    fn key_exists(&self, name: &str) -> bool;

    /// Create an authentication-gated key. Idempotent: if a key with this
    /// name already exists the call is a no-op success. Returns `false` on
    /// any provider failure; a key is never partially created.
    fn create_key(&self, name: &str, params: &KeyParams) -> bool;

    /// Delete the key with this name. Deleting a missing key succeeds.
    fn delete_key(&self, name: &str) -> bool;

    /// Encrypt `plaintext` under the named key.
    fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<EncryptedSecret, KeystoreError>;

    /// Decrypt `ciphertext` with the named key and the IV recorded at
    /// encryption time.
    fn decrypt(&self, name: &str, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, KeystoreError>;
}

/// 256-bit key material with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_SIZE],
}

impl KeyMaterial {
    /// Generate fresh random key material from the process CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Wrap existing key bytes.
    ///
    /// # Panics
    /// Panics if the slice is not exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(slice);
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Tracks the instant of the last successful user authentication.
///
/// Shared between a software keystore (which checks freshness before every
/// cipher operation) and the host adapter (which marks it when a credential
/// challenge is granted). Starts out never-authenticated.
#[derive(Default)]
pub struct AuthWindow {
    last_unlock: Mutex<Option<Instant>>,
}

impl AuthWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful user authentication at the current instant.
    pub fn mark_unlocked(&self) {
        *self.guard() = Some(Instant::now());
    }

    /// Whether the last authentication happened within `validity`.
    ///
    /// Never-authenticated and a zero validity both report stale.
    pub fn is_fresh(&self, validity: Duration) -> bool {
        match *self.guard() {
            Some(at) => at.elapsed() < validity,
            None => false,
        }
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.last_unlock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Encrypt with AES-256-GCM under a random 96-bit nonce.
///
/// The nonce doubles as the record IV and is returned alongside the
/// ciphertext, never reused.
pub(crate) fn seal(
    material: &KeyMaterial,
    plaintext: &[u8],
) -> Result<EncryptedSecret, KeystoreError> {
    let cipher = Aes256Gcm::new_from_slice(material.as_bytes())
        .map_err(|e| KeystoreError::EncryptionFailed(format!("invalid key: {}", e)))?;

    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| KeystoreError::EncryptionFailed(format!("cipher failure: {}", e)))?;

    Ok(EncryptedSecret {
        ciphertext,
        iv: iv.to_vec(),
    })
}

/// Decrypt an AES-256-GCM record. Tag or format failures report corrupt data.
pub(crate) fn open(
    material: &KeyMaterial,
    ciphertext: &[u8],
    iv: &[u8],
) -> Result<Vec<u8>, KeystoreError> {
    if iv.len() != IV_SIZE {
        return Err(KeystoreError::CorruptData(format!(
            "expected {}-byte IV, got {}",
            IV_SIZE,
            iv.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(material.as_bytes())
        .map_err(|e| KeystoreError::EncryptionFailed(format!("invalid key: {}", e)))?;

    let nonce = Nonce::from_slice(iv);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| KeystoreError::CorruptData("authentication tag mismatch".into()))
}

struct SoftwareKey {
    material: KeyMaterial,
    params: KeyParams,
}

/// In-memory keystore honoring the authentication-window contract.
///
/// The software fallback for targets without a hardware keystore, and the
/// substitute used throughout the test suite. Key material lives only in
/// process memory and zeroizes on drop.
pub struct SoftwareKeystore {
    keys: Mutex<HashMap<String, SoftwareKey>>,
    auth: Arc<AuthWindow>,
}

impl SoftwareKeystore {
    /// Create an empty keystore gated by the given authentication window.
    pub fn new(auth: Arc<AuthWindow>) -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            auth,
        }
    }

    fn keys(&self) -> std::sync::MutexGuard<'_, HashMap<String, SoftwareKey>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_window(&self, params: &KeyParams) -> Result<(), KeystoreError> {
        let validity = Duration::from_secs(u64::from(params.auth_validity_secs));
        if self.auth.is_fresh(validity) {
            Ok(())
        } else {
            Err(KeystoreError::NotAuthenticated)
        }
    }
}

impl Keystore for SoftwareKeystore {
    fn key_exists(&self, name: &str) -> bool {
        self.keys().contains_key(name)
    }

    fn create_key(&self, name: &str, params: &KeyParams) -> bool {
        let mut keys = self.keys();
        if keys.contains_key(name) {
            debug!("create_key: key {} already exists, keeping it", name);
            return true;
        }
        keys.insert(
            name.to_string(),
            SoftwareKey {
                material: KeyMaterial::generate(),
                params: *params,
            },
        );
        debug!(
            "create_key: generated key {} (validity {}s)",
            name, params.auth_validity_secs
        );
        true
    }

    fn delete_key(&self, name: &str) -> bool {
        if self.keys().remove(name).is_some() {
            debug!("delete_key: removed key {}", name);
        }
        true
    }

    fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<EncryptedSecret, KeystoreError> {
        let keys = self.keys();
        let key = keys
            .get(name)
            .ok_or_else(|| KeystoreError::KeyNotFound(name.to_string()))?;
        self.check_window(&key.params)?;
        seal(&key.material, plaintext)
    }

    fn decrypt(&self, name: &str, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        let keys = self.keys();
        let key = keys
            .get(name)
            .ok_or_else(|| KeystoreError::KeyNotFound(name.to_string()))?;
        self.check_window(&key.params)?;
        open(&key.material, ciphertext, iv).map_err(|e| {
            warn!("decrypt: record for key {} failed validation", name);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: KeyParams = KeyParams {
        auth_validity_secs: 30,
        invalidate_on_biometric_enrollment: true,
    };

    fn unlocked_store() -> SoftwareKeystore {
        let auth = Arc::new(AuthWindow::new());
        auth.mark_unlocked();
        SoftwareKeystore::new(auth)
    }

    #[test]
    fn create_key_is_idempotent() {
        let store = unlocked_store();
        assert!(store.create_key("pin-key", &PARAMS));
        let record = store.encrypt("pin-key", b"1234").unwrap();

        // Second creation keeps the existing material: the old record
        // still decrypts.
        assert!(store.create_key("pin-key", &PARAMS));
        let plain = store
            .decrypt("pin-key", &record.ciphertext, &record.iv)
            .unwrap();
        assert_eq!(plain, b"1234");
    }

    #[test]
    fn roundtrip_when_authenticated() {
        let store = unlocked_store();
        store.create_key("pin-key", &PARAMS);
        let record = store.encrypt("pin-key", b"secret pin").unwrap();
        let plain = store
            .decrypt("pin-key", &record.ciphertext, &record.iv)
            .unwrap();
        assert_eq!(plain, b"secret pin");
    }

    #[test]
    fn never_authenticated_is_gated() {
        let store = SoftwareKeystore::new(Arc::new(AuthWindow::new()));
        store.create_key("pin-key", &PARAMS);
        assert!(matches!(
            store.encrypt("pin-key", b"1234"),
            Err(KeystoreError::NotAuthenticated)
        ));
    }

    #[test]
    fn zero_validity_window_is_always_stale() {
        let auth = Arc::new(AuthWindow::new());
        auth.mark_unlocked();
        let store = SoftwareKeystore::new(auth);
        store.create_key(
            "pin-key",
            &KeyParams {
                auth_validity_secs: 0,
                invalidate_on_biometric_enrollment: false,
            },
        );
        assert!(matches!(
            store.encrypt("pin-key", b"1234"),
            Err(KeystoreError::NotAuthenticated)
        ));
    }

    #[test]
    fn missing_key_reports_key_not_found() {
        let store = unlocked_store();
        assert!(matches!(
            store.encrypt("absent", b"1234"),
            Err(KeystoreError::KeyNotFound(_))
        ));
        assert!(matches!(
            store.decrypt("absent", b"junk", &[0u8; IV_SIZE]),
            Err(KeystoreError::KeyNotFound(_))
        ));
    }

    #[test]
    fn deleted_key_is_gone() {
        let store = unlocked_store();
        store.create_key("pin-key", &PARAMS);
        assert!(store.key_exists("pin-key"));
        assert!(store.delete_key("pin-key"));
        assert!(!store.key_exists("pin-key"));
        // Deleting again still succeeds
        assert!(store.delete_key("pin-key"));
    }

    #[test]
    fn tampered_ciphertext_is_corrupt() {
        let store = unlocked_store();
        store.create_key("pin-key", &PARAMS);
        let mut record = store.encrypt("pin-key", b"1234").unwrap();
        record.ciphertext[0] ^= 0xff;
        assert!(matches!(
            store.decrypt("pin-key", &record.ciphertext, &record.iv),
            Err(KeystoreError::CorruptData(_))
        ));
    }

    #[test]
    fn wrong_iv_is_corrupt() {
        let store = unlocked_store();
        store.create_key("pin-key", &PARAMS);
        let record = store.encrypt("pin-key", b"1234").unwrap();

        let other = store.encrypt("pin-key", b"5678").unwrap();
        assert!(matches!(
            store.decrypt("pin-key", &record.ciphertext, &other.iv),
            Err(KeystoreError::CorruptData(_))
        ));

        // Truncated IV fails format validation outright
        assert!(matches!(
            store.decrypt("pin-key", &record.ciphertext, &record.iv[..4]),
            Err(KeystoreError::CorruptData(_))
        ));
    }

    #[test]
    fn key_material_debug_is_redacted() {
        let material = KeyMaterial::from_slice(&[7u8; KEY_SIZE]);
        let printed = format!("{:?}", material);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains('7'));
    }
}
