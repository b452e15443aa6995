//! VaultManager - the bridge facade over gate, vault core and coordinator.
//!
//! One instance per platform adapter. Every collaborator is injected, so
//! multiple independent managers can coexist in one process and tests can
//! substitute any piece. The manager owns the operation surface the
//! application layer sees:
//! - device security: `is_device_secure`, `make_device_secure`
//! - key lifecycle: `keystore_init`, `delete_key`
//! - the secret slot: `store_pin`, `retrieve_pin`
//! plus the host-callback entry points for challenge results and teardown.

use std::sync::Arc;

use tracing::{debug, info};

use super::core::Vault;
use super::gate::DeviceGate;
use super::host::CredentialHost;
use super::keystore::{KeyParams, Keystore};
use super::persistence::SecretPersistence;
use super::reauth::{ChallengeBroker, ReauthCoordinator};
use crate::error::{Error, Result};

pub struct VaultManager {
    gate: DeviceGate,
    vault: Vault,
    reauth: ReauthCoordinator,
    keystore: Arc<dyn Keystore>,
    broker: Arc<ChallengeBroker>,
}

impl VaultManager {
    /// Wire a manager from its collaborators.
    pub fn new(
        keystore: Arc<dyn Keystore>,
        persistence: Arc<dyn SecretPersistence>,
        host: Arc<dyn CredentialHost>,
        broker: Arc<ChallengeBroker>,
    ) -> Self {
        Self {
            gate: DeviceGate::new(host.clone(), broker.clone()),
            vault: Vault::new(keystore.clone(), persistence),
            reauth: ReauthCoordinator::new(host, broker.clone()),
            keystore,
            broker,
        }
    }

    /// Whether a lock-screen credential is currently configured.
    pub fn is_device_secure(&self) -> bool {
        self.gate.is_device_secure()
    }

    /// Interactively walk the user through securing the device.
    pub async fn make_device_secure(&self, message: &str, action_label: &str) -> Result<bool> {
        self.gate.request_security_setup(message, action_label).await
    }

    /// Ensure an authentication-gated key named `key_name` exists.
    ///
    /// Safe to call on every launch: an existing key is left untouched.
    /// Refuses before touching key material when the device is not secure.
    pub async fn keystore_init(
        &self,
        key_name: &str,
        auth_validity_secs: u32,
        invalidate_on_biometric_enrollment: bool,
    ) -> Result<bool> {
        if !self.gate.is_device_secure() {
            info!("keystore_init refused: device is not secure");
            return Err(Error::DeviceNotSecure);
        }

        if self.keystore.key_exists(key_name) {
            debug!("keystore_init: key {} exists", key_name);
            return Ok(true);
        }

        info!("keystore_init: key {} does not exist, creating it", key_name);
        let params = KeyParams {
            auth_validity_secs,
            invalidate_on_biometric_enrollment,
        };
        if self.keystore.create_key(key_name, &params) {
            Ok(true)
        } else {
            Err(Error::KeyCreationFailed(key_name.to_string()))
        }
    }

    /// Encrypt and persist the PIN, challenging the user once if the key's
    /// authentication window has elapsed.
    pub async fn store_pin(&self, key_name: &str, value: &str) -> Result<bool> {
        self.reauth.store_secret(&self.vault, key_name, value).await
    }

    /// Read back and decrypt the PIN. An elapsed authentication window is
    /// terminal here; there is no challenge wiring on this path.
    pub fn retrieve_pin(&self, key_name: &str) -> Result<String> {
        self.vault.retrieve_secret(key_name)
    }

    /// Delete the named key. The persisted record, if any, stays on disk
    /// and becomes unreadable.
    pub fn delete_key(&self, key_name: &str) -> bool {
        self.keystore.delete_key(key_name)
    }

    /// Deliver a host UI challenge result. Returns whether a challenge was
    /// waiting for it.
    pub fn resolve_challenge(&self, request_code: u32, granted: bool) -> bool {
        self.broker.resolve(request_code, granted)
    }

    /// Resolve every outstanding challenge as denied. Call when the host
    /// environment is torn down.
    pub fn cancel_pending(&self) {
        self.broker.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::vault::keystore::{
        AuthWindow, EncryptedSecret, KeystoreError, SoftwareKeystore,
    };

    /// In-memory single-slot persistence.
    #[derive(Default)]
    struct MemStore {
        slot: Mutex<Option<EncryptedSecret>>,
    }

    impl SecretPersistence for MemStore {
        fn write(&self, record: &EncryptedSecret) -> io::Result<()> {
            *self.slot.lock().unwrap() = Some(record.clone());
            Ok(())
        }
        fn read(&self) -> io::Result<Option<EncryptedSecret>> {
            Ok(self.slot.lock().unwrap().clone())
        }
        fn clear(&self) -> io::Result<()> {
            *self.slot.lock().unwrap() = None;
            Ok(())
        }
    }

    /// Keystore stub: gates the first `gate_for` encrypt calls, records all
    /// encrypt arguments, counts key creations.
    #[derive(Default)]
    struct StubKeystore {
        encrypt_calls: Mutex<Vec<(String, Vec<u8>)>>,
        gate_for: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl Keystore for StubKeystore {
        fn key_exists(&self, _name: &str) -> bool {
            false
        }
        fn create_key(&self, _name: &str, _params: &KeyParams) -> bool {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            true
        }
        fn delete_key(&self, _name: &str) -> bool {
            true
        }
        fn encrypt(
            &self,
            name: &str,
            plaintext: &[u8],
        ) -> std::result::Result<EncryptedSecret, KeystoreError> {
            self.encrypt_calls
                .lock()
                .unwrap()
                .push((name.to_string(), plaintext.to_vec()));
            let remaining = self.gate_for.load(Ordering::SeqCst);
            if remaining > 0 {
                self.gate_for.store(remaining - 1, Ordering::SeqCst);
                return Err(KeystoreError::NotAuthenticated);
            }
            Ok(EncryptedSecret {
                ciphertext: plaintext.to_vec(),
                iv: vec![0; 12],
            })
        }
        fn decrypt(
            &self,
            _name: &str,
            ciphertext: &[u8],
            _iv: &[u8],
        ) -> std::result::Result<Vec<u8>, KeystoreError> {
            Ok(ciphertext.to_vec())
        }
    }

    /// Host stub that answers credential challenges with a fixed verdict.
    struct StubHost {
        secure: bool,
        grant: bool,
        /// `false` simulates a missing foreground UI context.
        can_present: bool,
        challenges: AtomicUsize,
        broker: Arc<ChallengeBroker>,
    }

    #[async_trait]
    impl CredentialHost for StubHost {
        fn is_device_secure(&self) -> bool {
            self.secure
        }
        async fn confirm_setup(&self, _description: &str, _action_label: &str) -> bool {
            true
        }
        fn open_set_credential_flow(&self) -> bool {
            false
        }
        fn present_credential_challenge(&self, request_code: u32) -> bool {
            if !self.can_present {
                return false;
            }
            self.challenges.fetch_add(1, Ordering::SeqCst);
            self.broker.resolve(request_code, self.grant);
            true
        }
    }

    fn manager_with(
        keystore: Arc<dyn Keystore>,
        secure: bool,
        grant: bool,
        can_present: bool,
    ) -> (Arc<StubHost>, VaultManager) {
        let broker = Arc::new(ChallengeBroker::new());
        let host = Arc::new(StubHost {
            secure,
            grant,
            can_present,
            challenges: AtomicUsize::new(0),
            broker: broker.clone(),
        });
        let manager = VaultManager::new(
            keystore,
            Arc::new(MemStore::default()),
            host.clone(),
            broker,
        );
        (host, manager)
    }

    #[tokio::test]
    async fn granted_challenge_replays_store_once() {
        let keystore = Arc::new(StubKeystore::default());
        keystore.gate_for.store(1, Ordering::SeqCst);
        let (host, manager) = manager_with(keystore.clone(), true, true, true);

        assert!(manager.store_pin("pin-key", "1234").await.unwrap());

        // Exactly two encrypt calls with identical arguments
        let calls = keystore.encrypt_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(host.challenges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denied_challenge_is_terminal_after_one_attempt() {
        let keystore = Arc::new(StubKeystore::default());
        keystore.gate_for.store(1, Ordering::SeqCst);
        let (_, manager) = manager_with(keystore.clone(), true, false, true);

        assert!(matches!(
            manager.store_pin("pin-key", "1234").await,
            Err(Error::UserNotAuthenticated)
        ));
        assert_eq!(keystore.encrypt_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_foreground_ui_is_terminal() {
        let keystore = Arc::new(StubKeystore::default());
        keystore.gate_for.store(1, Ordering::SeqCst);
        let (host, manager) = manager_with(keystore.clone(), true, true, false);

        assert!(matches!(
            manager.store_pin("pin-key", "1234").await,
            Err(Error::UserNotAuthenticated)
        ));
        assert_eq!(keystore.encrypt_calls.lock().unwrap().len(), 1);
        // The registered listener was cleaned up
        assert!(!host.broker.has_pending(crate::vault::reauth::ENCRYPT_AUTH_REQUEST_CODE));
    }

    #[tokio::test]
    async fn still_gated_replay_does_not_loop() {
        let keystore = Arc::new(StubKeystore::default());
        keystore.gate_for.store(2, Ordering::SeqCst);
        let (host, manager) = manager_with(keystore.clone(), true, true, true);

        assert!(matches!(
            manager.store_pin("pin-key", "1234").await,
            Err(Error::UserNotAuthenticated)
        ));
        // One challenge, two encrypt attempts, no further loop
        assert_eq!(host.challenges.load(Ordering::SeqCst), 1);
        assert_eq!(keystore.encrypt_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn insecure_device_blocks_key_creation() {
        let keystore = Arc::new(StubKeystore::default());
        let (_, manager) = manager_with(keystore.clone(), false, true, true);

        assert!(matches!(
            manager.keystore_init("pin-key", 30, true).await,
            Err(Error::DeviceNotSecure)
        ));
        assert_eq!(keystore.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keystore_init_is_idempotent() {
        let auth = Arc::new(AuthWindow::new());
        let keystore = Arc::new(SoftwareKeystore::new(auth));
        let (_, manager) = manager_with(keystore, true, true, true);

        assert!(manager.keystore_init("pin-key", 30, true).await.unwrap());
        assert!(manager.keystore_init("pin-key", 30, true).await.unwrap());
    }

    #[tokio::test]
    async fn pin_roundtrip_within_auth_window() {
        let auth = Arc::new(AuthWindow::new());
        let keystore = Arc::new(SoftwareKeystore::new(auth.clone()));
        let (_, manager) = manager_with(keystore, true, true, true);

        assert!(manager.keystore_init("pin-key", 30, true).await.unwrap());
        auth.mark_unlocked();
        assert!(manager.store_pin("pin-key", "1234").await.unwrap());
        assert_eq!(manager.retrieve_pin("pin-key").unwrap(), "1234");
    }

    #[tokio::test]
    async fn retrieve_has_no_challenge_wiring() {
        // A zero-validity key is permanently gated even right after unlock,
        // so any retrieval hits the authentication gate.
        let auth = Arc::new(AuthWindow::new());
        auth.mark_unlocked();
        let keystore = Arc::new(SoftwareKeystore::new(auth));
        keystore.create_key(
            "pin-key",
            &KeyParams {
                auth_validity_secs: 0,
                invalidate_on_biometric_enrollment: false,
            },
        );

        let broker = Arc::new(ChallengeBroker::new());
        let host = Arc::new(StubHost {
            secure: true,
            grant: true,
            can_present: true,
            challenges: AtomicUsize::new(0),
            broker: broker.clone(),
        });
        let persistence = Arc::new(MemStore::default());
        persistence
            .write(&EncryptedSecret {
                ciphertext: vec![1, 2, 3],
                iv: vec![0; 12],
            })
            .unwrap();
        let manager = VaultManager::new(keystore, persistence, host.clone(), broker);

        assert!(matches!(
            manager.retrieve_pin("pin-key"),
            Err(Error::NotAuthenticated)
        ));
        // No credential challenge was presented
        assert_eq!(host.challenges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_pending_denies_an_outstanding_challenge() {
        let keystore = Arc::new(StubKeystore::default());
        keystore.gate_for.store(1, Ordering::SeqCst);

        // Host that presents but never answers; teardown resolves instead.
        struct SilentHost;
        #[async_trait]
        impl CredentialHost for SilentHost {
            fn is_device_secure(&self) -> bool {
                true
            }
            async fn confirm_setup(&self, _d: &str, _a: &str) -> bool {
                true
            }
            fn open_set_credential_flow(&self) -> bool {
                false
            }
            fn present_credential_challenge(&self, _request_code: u32) -> bool {
                true
            }
        }

        let broker = Arc::new(ChallengeBroker::new());
        let manager = Arc::new(VaultManager::new(
            keystore,
            Arc::new(MemStore::default()),
            Arc::new(SilentHost),
            broker.clone(),
        ));

        let storing = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.store_pin("pin-key", "1234").await })
        };
        // Let the store attempt register its challenge and suspend
        while !broker.has_pending(crate::vault::reauth::ENCRYPT_AUTH_REQUEST_CODE) {
            tokio::task::yield_now().await;
        }
        manager.cancel_pending();

        let outcome = storing.await.unwrap();
        assert!(matches!(outcome, Err(Error::UserNotAuthenticated)));
    }
}
