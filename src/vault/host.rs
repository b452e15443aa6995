//! Contract for the host UI / platform collaborator.
//!
//! The vault core treats everything interactive — dialogs, the credential
//! confirmation screen, the set-credential settings flow — as an external
//! collaborator behind this trait. Flows that finish out-of-band deliver
//! their result by resolving the `ChallengeBroker` under the request code
//! they were launched with.

use async_trait::async_trait;

/// Host-side platform queries and interactive flows.
#[async_trait]
pub trait CredentialHost: Send + Sync {
    /// Whether a lock-screen credential is currently configured.
    ///
    /// Queried live on every call, never cached. An unreachable security
    /// subsystem reports `false`.
    fn is_device_secure(&self) -> bool;

    /// Present a confirmation dialog before sending the user into the
    /// security setup flow. Resolves to whether the user accepted.
    async fn confirm_setup(&self, description: &str, action_label: &str) -> bool;

    /// Launch the platform's set-credential flow. Returns `false` when the
    /// flow cannot be launched (no foreground UI context). The outcome is
    /// delivered later via `ChallengeBroker::resolve` under
    /// `SET_CREDENTIAL_REQUEST_CODE`.
    fn open_set_credential_flow(&self) -> bool;

    /// Present the platform's credential-confirmation challenge. Returns
    /// `false` when it cannot be presented (no foreground UI context). The
    /// outcome is delivered later via `ChallengeBroker::resolve` under
    /// `request_code`.
    fn present_credential_challenge(&self, request_code: u32) -> bool;
}
