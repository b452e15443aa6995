//! Data types crossing the plugin boundary.
//!
//! Shapes are shared between the Tauri command surface and the native
//! mobile plugin calls; mobile plugins return `{}` for void results, which
//! needs a struct rather than `()` to deserialize.

use serde::{Deserialize, Serialize};

/// Response to the `isDeviceSecure` platform query.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSecureResponse {
    pub secure: bool,
}

/// Ask the host to show the pre-setup confirmation dialog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSetupRequest {
    pub description: String,
    pub action_label: String,
}

/// The user's answer to the confirmation dialog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSetupResponse {
    pub accepted: bool,
}

/// Outcome of the platform's set-credential settings flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCredentialFlowResponse {
    pub granted: bool,
}

/// Ask the host to present a credential-confirmation challenge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub request_code: u32,
}

/// Outcome of a credential-confirmation challenge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub granted: bool,
}

/// Operations addressed by key name only.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRequest {
    pub key_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyExistsResponse {
    pub exists: bool,
}

/// Create an authentication-gated key in the platform keystore.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub key_name: String,
    pub auth_validity_secs: u32,
    pub invalidate_on_biometric_enrollment: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyResponse {
    pub created: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteKeyResponse {
    pub deleted: bool,
}

/// Encrypt plaintext under a named keystore key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptRequest {
    pub key_name: String,
    pub plaintext: Vec<u8>,
}

/// Decrypt a ciphertext/IV record with a named keystore key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    pub key_name: String,
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptResponse {
    pub plaintext: Vec<u8>,
}

/// Response from the `retrieve_pin` command.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievePinResponse {
    pub value: String,
}

/// Empty response for void operations.
/// Mobile plugins return {} which needs to deserialize into a struct, not ().
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmptyResponse {}
