//! Bridge-level error taxonomy.
//!
//! Every backend, filesystem and UI failure is translated into one of these
//! kinds before it crosses the bridge, so the application layer only ever
//! sees a stable `{ code, message }` pair. Raw provider errors never leak.

use thiserror::Error;

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the application layer.
#[derive(Error, Debug)]
pub enum Error {
    /// No lock-screen credential is configured on the device.
    #[error("device has no lock-screen credential")]
    DeviceNotSecure,

    /// The user dismissed the security-setup confirmation dialog.
    #[error("user cancelled the security setup")]
    UserCancelledSetup,

    /// The cryptographic provider failed to generate the key.
    #[error("failed to create key {0}")]
    KeyCreationFailed(String),

    /// No key with the given name exists.
    #[error("no key named {0}")]
    KeyNotFound(String),

    /// The key's authentication window has elapsed. Recoverable on the
    /// store path via a credential challenge; terminal on retrieval.
    #[error("user has not authenticated within the key's validity window")]
    NotAuthenticated,

    /// The credential challenge was denied, cancelled, could not be
    /// presented, or the replay after it failed again. Terminal.
    #[error("user did not authenticate")]
    UserNotAuthenticated,

    /// A challenge for this request code is already outstanding.
    #[error("a credential challenge with request code {0} is already pending")]
    ChallengePending(u32),

    /// The backend failed to encrypt for a reason other than the gate.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// The backend failed to decrypt for a reason other than the gate.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Persisted data failed tag, format or encoding validation.
    #[error("stored secret is corrupted: {0}")]
    CorruptData(String),

    /// No secret record has been persisted.
    #[error("no stored secret")]
    SecretNotFound,

    /// Reading or writing the persisted record failed.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// The keystore or the host UI context cannot be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Native plugin invocation failed with an unmapped error.
    #[cfg(mobile)]
    #[error("plugin invoke error: {0}")]
    PluginInvoke(String),
}

impl Error {
    /// Stable error code for programmatic handling on the other side of
    /// the bridge.
    pub fn code(&self) -> &'static str {
        match self {
            Error::DeviceNotSecure => "DEVICE_NOT_SECURE",
            Error::UserCancelledSetup => "USER_CANCELLED_SETUP",
            Error::KeyCreationFailed(_) => "KEY_CREATION_FAILED",
            Error::KeyNotFound(_) => "KEY_NOT_FOUND",
            Error::NotAuthenticated => "NOT_AUTHENTICATED",
            Error::UserNotAuthenticated => "USER_NOT_AUTHENTICATED",
            Error::ChallengePending(_) => "CHALLENGE_PENDING",
            Error::EncryptionFailed(_) => "ENCRYPTION_FAILED",
            Error::DecryptionFailed(_) => "DECRYPTION_FAILED",
            Error::CorruptData(_) => "CORRUPT_DATA",
            Error::SecretNotFound => "SECRET_NOT_FOUND",
            Error::PersistenceFailed(_) => "PERSISTENCE_FAILED",
            Error::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            #[cfg(mobile)]
            Error::PluginInvoke(_) => "PLUGIN_INVOKE_ERROR",
        }
    }
}

#[cfg(mobile)]
impl From<tauri::plugin::mobile::PluginInvokeError> for Error {
    fn from(err: tauri::plugin::mobile::PluginInvokeError) -> Self {
        Error::PluginInvoke(err.to_string())
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        // Structured object so the frontend can branch on the code
        let mut state = serializer.serialize_struct("Error", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
