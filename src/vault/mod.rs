//! Authenticated local-secret vault.
//!
//! The platform-independent core of the plugin:
//! - `keystore`: authentication-gated symmetric keys behind the `Keystore`
//!   capability trait, plus the in-memory software fallback
//! - `persistence`: the two-blob ciphertext/IV record on disk
//! - `host`: the contract for the interactive platform collaborator
//! - `gate`: device-security checking and the interactive setup flow
//! - `reauth`: one-shot credential challenges and the replay-once protocol
//! - `core`: encrypt-then-persist / read-then-decrypt orchestration
//! - `manager`: the facade the platform adapters and commands talk to

pub mod core;
pub mod gate;
pub mod host;
pub mod keystore;
pub mod manager;
pub mod persistence;
pub mod reauth;

pub use self::core::Vault;
pub use gate::DeviceGate;
pub use host::CredentialHost;
pub use keystore::{
    AuthWindow, EncryptedSecret, KeyMaterial, KeyParams, Keystore, KeystoreError, SoftwareKeystore,
};
pub use manager::VaultManager;
pub use persistence::{FileSecretStore, SecretPersistence};
pub use reauth::{
    ChallengeBroker, ReauthCoordinator, ENCRYPT_AUTH_REQUEST_CODE, SET_CREDENTIAL_REQUEST_CODE,
};
