//! Tauri command handlers for the pinvault plugin.

use tauri::{command, AppHandle, Runtime};

use crate::models::RetrievePinResponse;
use crate::PinvaultExt;
use crate::Result;

/// Whether the device currently has a lock-screen credential configured.
///
/// Queried live from the platform; an unreachable security subsystem
/// reports `false` rather than an error.
#[command]
pub(crate) async fn is_device_secure<R: Runtime>(app: AppHandle<R>) -> Result<bool> {
    Ok(app.pinvault().is_device_secure())
}

/// Walk the user through configuring a lock-screen credential.
///
/// Shows a confirmation dialog with `message` and `action_label`, then
/// opens the platform's set-credential flow. Resolves to the post-flow
/// security state; dismissing the dialog rejects with
/// `USER_CANCELLED_SETUP`.
#[command]
pub(crate) async fn make_device_secure<R: Runtime>(
    app: AppHandle<R>,
    message: String,
    action_label: String,
) -> Result<bool> {
    app.pinvault()
        .make_device_secure(&message, &action_label)
        .await
}

/// Ensure the authentication-gated key exists.
///
/// Idempotent across launches. Fails with `DEVICE_NOT_SECURE` before any
/// key material is created when no lock-screen credential is set.
#[command]
pub(crate) async fn keystore_init<R: Runtime>(
    app: AppHandle<R>,
    key_name: String,
    auth_validity_secs: u32,
    invalidate_on_biometric_enrollment: bool,
) -> Result<bool> {
    app.pinvault()
        .keystore_init(&key_name, auth_validity_secs, invalidate_on_biometric_enrollment)
        .await
}

/// Encrypt and persist the PIN under the named key.
///
/// If the key's authentication window has elapsed, the user is challenged
/// for their credential and the store is replayed once after a grant.
#[command]
pub(crate) async fn store_pin<R: Runtime>(
    app: AppHandle<R>,
    key_name: String,
    value: String,
) -> Result<bool> {
    app.pinvault().store_pin(&key_name, &value).await
}

/// Decrypt and return the persisted PIN.
///
/// An elapsed authentication window fails with `NOT_AUTHENTICATED`; this
/// path never presents a challenge.
#[command]
pub(crate) async fn retrieve_pin<R: Runtime>(
    app: AppHandle<R>,
    key_name: String,
) -> Result<RetrievePinResponse> {
    let value = app.pinvault().retrieve_pin(&key_name)?;
    Ok(RetrievePinResponse { value })
}

/// Delete the named key from the platform keystore.
#[command]
pub(crate) async fn delete_key<R: Runtime>(app: AppHandle<R>, key_name: String) -> Result<bool> {
    Ok(app.pinvault().delete_key(&key_name))
}
