//! Mobile implementation bridging to native Android/iOS code.
//!
//! The native side owns everything this crate cannot do itself:
//! - **Android**: AndroidKeyStore keys with a user-authentication validity
//!   window, the keyguard query, and the confirm-credential activity
//! - **iOS**: Secure Enclave keys and LocalAuthentication
//!
//! The vault orchestration stays in Rust; each `Keystore` and
//! `CredentialHost` call is one `run_mobile_plugin` invocation. Interactive
//! flows block a background task and deliver their verdict back through the
//! challenge broker, so the calling side suspends on the broker handle just
//! like everywhere else.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tauri::{
    plugin::{PluginApi, PluginHandle},
    AppHandle, Manager, Runtime,
};
use tracing::{debug, warn};

use crate::error::Error;
use crate::models::*;
use crate::vault::{
    ChallengeBroker, CredentialHost, EncryptedSecret, FileSecretStore, KeyParams, Keystore,
    KeystoreError, VaultManager,
};

#[cfg(target_os = "ios")]
tauri::ios_plugin_binding!(init_plugin_pinvault);

/// Initialize the mobile plugin by registering native code.
pub fn init<R: Runtime, C: DeserializeOwned>(
    app: &AppHandle<R>,
    api: PluginApi<R, C>,
) -> crate::Result<Pinvault<R>> {
    #[cfg(target_os = "android")]
    let handle = api.register_android_plugin("com.plugin.pinvault", "PinvaultPlugin")?;
    #[cfg(target_os = "ios")]
    let handle = api.register_ios_plugin(init_plugin_pinvault)?;

    let data_dir = app
        .path()
        .app_local_data_dir()
        .map_err(|e| Error::PersistenceFailed(e.to_string()))?
        .join("pinvault");
    std::fs::create_dir_all(&data_dir).map_err(|e| Error::PersistenceFailed(e.to_string()))?;

    let broker = Arc::new(ChallengeBroker::new());
    let keystore = Arc::new(NativeKeystore {
        handle: handle.clone(),
    });
    let host = Arc::new(NativeHost {
        handle,
        broker: broker.clone(),
    });
    let persistence = Arc::new(FileSecretStore::new(data_dir));

    Ok(Pinvault {
        _app: app.clone(),
        manager: VaultManager::new(keystore, persistence, host, broker),
    })
}

/// Access to the pinvault APIs for mobile platforms.
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

/// Map native error codes onto the keystore failure taxonomy.
///
/// Native plugins report structured codes inside the invoke error message.
fn map_native_error(name: &str, err: tauri::plugin::mobile::PluginInvokeError) -> KeystoreError {
    let msg = err.to_string();
    if msg.contains("NOT_AUTHENTICATED") {
        KeystoreError::NotAuthenticated
    } else if msg.contains("KEY_NOT_FOUND") {
        KeystoreError::KeyNotFound(name.to_string())
    } else if msg.contains("CORRUPT_DATA") || msg.contains("BAD_PADDING") {
        KeystoreError::CorruptData(msg)
    } else if msg.contains("KEYSTORE_UNAVAILABLE") {
        KeystoreError::Unavailable(msg)
    } else {
        KeystoreError::EncryptionFailed(msg)
    }
}

/// Hardware-backed keystore behind the native plugin.
pub struct NativeKeystore<R: Runtime> {
    handle: PluginHandle<R>,
}

impl<R: Runtime> Keystore for NativeKeystore<R> {
    fn key_exists(&self, name: &str) -> bool {
        self.handle
            .run_mobile_plugin::<KeyExistsResponse>(
                "keyExists",
                KeyRequest {
                    key_name: name.to_string(),
                },
            )
            .map(|r| r.exists)
            .unwrap_or_else(|e| {
                warn!("keyExists failed, treating as missing: {}", e);
                false
            })
    }

    fn create_key(&self, name: &str, params: &KeyParams) -> bool {
        self.handle
            .run_mobile_plugin::<CreateKeyResponse>(
                "createKey",
                CreateKeyRequest {
                    key_name: name.to_string(),
                    auth_validity_secs: params.auth_validity_secs,
                    invalidate_on_biometric_enrollment: params.invalidate_on_biometric_enrollment,
                },
            )
            .map(|r| r.created)
            .unwrap_or_else(|e| {
                warn!("createKey failed for {}: {}", name, e);
                false
            })
    }

    fn delete_key(&self, name: &str) -> bool {
        self.handle
            .run_mobile_plugin::<DeleteKeyResponse>(
                "deleteKey",
                KeyRequest {
                    key_name: name.to_string(),
                },
            )
            .map(|r| r.deleted)
            .unwrap_or_else(|e| {
                warn!("deleteKey failed for {}: {}", name, e);
                false
            })
    }

    fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<EncryptedSecret, KeystoreError> {
        self.handle
            .run_mobile_plugin::<EncryptedSecret>(
                "encrypt",
                EncryptRequest {
                    key_name: name.to_string(),
                    plaintext: plaintext.to_vec(),
                },
            )
            .map_err(|e| map_native_error(name, e))
    }

    fn decrypt(&self, name: &str, ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        self.handle
            .run_mobile_plugin::<DecryptResponse>(
                "decrypt",
                DecryptRequest {
                    key_name: name.to_string(),
                    ciphertext: ciphertext.to_vec(),
                    iv: iv.to_vec(),
                },
            )
            .map(|r| r.plaintext)
            .map_err(|e| map_native_error(name, e))
    }
}

/// Host collaborator backed by native dialogs and activities.
pub struct NativeHost<R: Runtime> {
    handle: PluginHandle<R>,
    broker: Arc<ChallengeBroker>,
}

#[async_trait::async_trait]
impl<R: Runtime> CredentialHost for NativeHost<R> {
    fn is_device_secure(&self) -> bool {
        self.handle
            .run_mobile_plugin::<DeviceSecureResponse>("isDeviceSecure", ())
            .map(|r| r.secure)
            .unwrap_or_else(|e| {
                warn!("isDeviceSecure failed, treating as insecure: {}", e);
                false
            })
    }

    async fn confirm_setup(&self, description: &str, action_label: &str) -> bool {
        let handle = self.handle.clone();
        let request = ConfirmSetupRequest {
            description: description.to_string(),
            action_label: action_label.to_string(),
        };
        tauri::async_runtime::spawn_blocking(move || {
            handle
                .run_mobile_plugin::<ConfirmSetupResponse>("confirmSetup", request)
                .map(|r| r.accepted)
                .unwrap_or_else(|e| {
                    warn!("confirmSetup failed: {}", e);
                    false
                })
        })
        .await
        .unwrap_or(false)
    }

    fn open_set_credential_flow(&self) -> bool {
        let handle = self.handle.clone();
        let broker = self.broker.clone();
        tauri::async_runtime::spawn_blocking(move || {
            // Blocks until the settings activity returns its result
            let granted = handle
                .run_mobile_plugin::<SetCredentialFlowResponse>("openSetCredentialFlow", ())
                .map(|r| r.granted)
                .unwrap_or_else(|e| {
                    warn!("openSetCredentialFlow failed: {}", e);
                    false
                });
            broker.resolve(crate::vault::SET_CREDENTIAL_REQUEST_CODE, granted);
        });
        true
    }

    fn present_credential_challenge(&self, request_code: u32) -> bool {
        let handle = self.handle.clone();
        let broker = self.broker.clone();
        debug!("presenting native credential challenge {}", request_code);
        tauri::async_runtime::spawn_blocking(move || {
            // Blocks until the confirm-credential activity returns
            let granted = handle
                .run_mobile_plugin::<ChallengeResponse>(
                    "presentCredentialChallenge",
                    ChallengeRequest { request_code },
                )
                .map(|r| r.granted)
                .unwrap_or_else(|e| {
                    warn!("credential challenge {} failed: {}", request_code, e);
                    false
                });
            broker.resolve(request_code, granted);
        });
        true
    }
}
