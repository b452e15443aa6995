//! Desktop implementation using the OS keyring.
//!
//! Desktops have no lock-screen re-authentication flow, so the adapter maps
//! the contract onto what the platform does have:
//! - **macOS**: Keychain Access
//! - **Windows**: Credential Manager
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)
//!
//! Key material lives in a keyring entry per key name; the cipher runs
//! in-process. "Device secure" means the session keyring is reachable, and a
//! credential challenge is granted immediately — access to the keyring is
//! already gated by the user's session login.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use keyring::Entry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tauri::{plugin::PluginApi, AppHandle, Manager, Runtime};
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::vault::{
    keystore, AuthWindow, ChallengeBroker, CredentialHost, EncryptedSecret, FileSecretStore,
    KeyMaterial, KeyParams, Keystore, KeystoreError, VaultManager,
};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "com.pinvault.keystore";

/// Account name used for the reachability probe.
const PROBE_ACCOUNT: &str = "probe";

/// Initialize the desktop plugin.
pub fn init<R: Runtime, C: DeserializeOwned>(
    app: &AppHandle<R>,
    _api: PluginApi<R, C>,
) -> crate::Result<Pinvault<R>> {
    let data_dir = app
        .path()
        .app_local_data_dir()
        .map_err(|e| Error::PersistenceFailed(e.to_string()))?
        .join("pinvault");
    std::fs::create_dir_all(&data_dir).map_err(|e| Error::PersistenceFailed(e.to_string()))?;

    let auth = Arc::new(AuthWindow::new());
    let broker = Arc::new(ChallengeBroker::new());
    let keystore = Arc::new(KeyringKeystore::new(auth.clone()));
    let host = Arc::new(DesktopHost::new(auth, broker.clone()));
    let persistence = Arc::new(FileSecretStore::new(data_dir));

    Ok(Pinvault {
        _app: app.clone(),
        manager: VaultManager::new(keystore, persistence, host, broker),
    })
}

/// Access to the pinvault APIs for desktop platforms.
pub struct Pinvault<R: Runtime> {
    _app: AppHandle<R>,
    manager: VaultManager,
}

impl<R: Runtime> Pinvault<R> {
    pub fn is_device_secure(&self) -> bool {
        self.manager.is_device_secure()
    }

    pub async fn make_device_secure(&self, message: &str, action_label: &str) -> crate::Result<bool> {
        self.manager.make_device_secure(message, action_label).await
    }

    pub async fn keystore_init(
        &self,
        key_name: &str,
        auth_validity_secs: u32,
        invalidate_on_biometric_enrollment: bool,
    ) -> crate::Result<bool> {
        self.manager
            .keystore_init(key_name, auth_validity_secs, invalidate_on_biometric_enrollment)
            .await
    }

    pub async fn store_pin(&self, key_name: &str, value: &str) -> crate::Result<bool> {
        self.manager.store_pin(key_name, value).await
    }

    pub fn retrieve_pin(&self, key_name: &str) -> crate::Result<String> {
        self.manager.retrieve_pin(key_name)
    }

    pub fn delete_key(&self, key_name: &str) -> bool {
        self.manager.delete_key(key_name)
    }

    /// Resolve every outstanding challenge as denied (app teardown).
    pub fn cancel_pending(&self) {
        self.manager.cancel_pending();
    }
}

/// What a keyring entry for one key holds: the key material plus the
/// parameters fixed at creation time.
#[derive(Serialize, Deserialize)]
struct StoredKey {
    key: String,
    params: KeyParams,
}

/// Keystore whose key material is held in the OS keyring.
///
/// The cipher itself runs in-process; the keyring contributes persistence
/// and session-login gating for the material.
pub struct KeyringKeystore {
    auth: Arc<AuthWindow>,
    /// Keyring backends are not all safe under concurrent access from one
    /// process; serialize entry operations.
    io_lock: Mutex<()>,
}

impl KeyringKeystore {
    pub fn new(auth: Arc<AuthWindow>) -> Self {
        Self {
            auth,
            io_lock: Mutex::new(()),
        }
    }

    fn entry(name: &str) -> Result<Entry, keyring::Error> {
        Entry::new(SERVICE_NAME, name)
    }

    fn load(&self, name: &str) -> Result<StoredKey, KeystoreError> {
        let _io = self.io_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = Self::entry(name)
            .map_err(|e| KeystoreError::Unavailable(format!("keyring entry: {}", e)))?;
        let payload = match entry.get_password() {
            Ok(payload) => payload,
            Err(keyring::Error::NoEntry) => {
                return Err(KeystoreError::KeyNotFound(name.to_string()))
            }
            Err(e) => return Err(KeystoreError::Unavailable(format!("keyring read: {}", e))),
        };
        serde_json::from_str(&payload)
            .map_err(|e| KeystoreError::Unavailable(format!("corrupt keyring entry: {}", e)))
    }

    fn material(stored: &StoredKey) -> Result<KeyMaterial, KeystoreError> {
        let bytes = base64_decode(&stored.key)
            .map_err(|e| KeystoreError::Unavailable(format!("corrupt key material: {}", e)))?;
        if bytes.len() != keystore::KEY_SIZE {
            return Err(KeystoreError::Unavailable("corrupt key material".into()));
        }
        Ok(KeyMaterial::from_slice(&bytes))
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

impl Keystore for KeyringKeystore {
    fn key_exists(&self, name: &str) -> bool {
        match self.load(name) {
            Ok(_) => true,
            Err(KeystoreError::KeyNotFound(_)) => false,
            Err(e) => {
                warn!("key_exists: treating unreachable keyring as missing: {}", e);
                false
            }
        }
    }

    fn create_key(&self, name: &str, params: &KeyParams) -> bool {
        if self.key_exists(name) {
            debug!("create_key: key {} already exists in keyring", name);
            return true;
        }

        let material = KeyMaterial::generate();
        let stored = StoredKey {
            key: base64_encode(material.as_bytes()),
            params: *params,
        };
        let payload = match serde_json::to_string(&stored) {
            Ok(payload) => payload,
            Err(e) => {
                error!("create_key: failed to serialize entry: {}", e);
                return false;
            }
        };

        let _io = self.io_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = match Self::entry(name) {
            Ok(entry) => entry,
            Err(e) => {
                error!("create_key: keyring entry failed: {}", e);
                return false;
            }
        };
        if let Err(e) = entry.set_password(&payload) {
            error!("create_key: failed to store key {}: {}", name, e);
            return false;
        }

        // Read back through a fresh entry so a silently failed write does
        // not leave us believing a key exists.
        match Self::entry(name).and_then(|e| e.get_password()) {
            Ok(readback) if readback == payload => {
                info!("create_key: generated key {} in OS keyring", name);
                true
            }
            Ok(_) => {
                error!("create_key: readback mismatch for key {}", name);
                let _ = entry.delete_credential();
                false
            }
            Err(e) => {
                error!("create_key: readback failed for key {}: {}", name, e);
                false
            }
        }
    }

    fn delete_key(&self, name: &str) -> bool {
        let _io = self.io_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = match Self::entry(name) {
            Ok(entry) => entry,
            Err(e) => {
                error!("delete_key: keyring entry failed: {}", e);
                return false;
            }
        };
        match entry.delete_credential() {
            Ok(()) => {
                info!("delete_key: removed key {} from OS keyring", name);
                true
            }
            // Deleting a missing key is a success
            Err(keyring::Error::NoEntry) => true,
            Err(e) => {
                error!("delete_key: failed to remove key {}: {}", name, e);
                false
            }
        }
    }

    fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<EncryptedSecret, KeystoreError> {
        let stored = self.load(name)?;
        self.check_window(&stored.params)?;
        keystore::seal(&Self::material(&stored)?, plaintext)
    }

    fn decrypt(&self, name: &str, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        let stored = self.load(name)?;
        self.check_window(&stored.params)?;
        keystore::open(&Self::material(&stored)?, ciphertext, iv)
    }
}

/// Host collaborator for desktop platforms.
///
/// There is no desktop set-credential flow: the confirmation dialog is
/// skipped and launching the flow reports no UI context. Credential
/// challenges are granted immediately and refresh the authentication
/// window — the session login already vouches for the user.
pub struct DesktopHost {
    auth: Arc<AuthWindow>,
    broker: Arc<ChallengeBroker>,
}

impl DesktopHost {
    pub fn new(auth: Arc<AuthWindow>, broker: Arc<ChallengeBroker>) -> Self {
        Self { auth, broker }
    }
}

#[async_trait::async_trait]
impl CredentialHost for DesktopHost {
    fn is_device_secure(&self) -> bool {
        // Reachable session keyring = the platform can protect key material
        let entry = match Entry::new(SERVICE_NAME, PROBE_ACCOUNT) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("keyring not available: {}", e);
                return false;
            }
        };
        match entry.get_password() {
            Ok(_) | Err(keyring::Error::NoEntry) => true,
            Err(e) => {
                warn!("keyring not accessible: {:?}", e);
                false
            }
        }
    }

    async fn confirm_setup(&self, _description: &str, _action_label: &str) -> bool {
        true
    }

    fn open_set_credential_flow(&self) -> bool {
        debug!("desktop has no set-credential flow");
        false
    }

    fn present_credential_challenge(&self, request_code: u32) -> bool {
        debug!("granting desktop challenge {}", request_code);
        self.auth.mark_unlocked();
        self.broker.resolve(request_code, true);
        true
    }
}

/// Base64 encode bytes to string.
fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Base64 decode string to bytes.
fn base64_decode(encoded: &str) -> Result<Vec<u8>, String> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| e.to_string())
}
