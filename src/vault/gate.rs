//! Device-security gate.
//!
//! No key material is created until the device has a lock-screen
//! credential. The gate answers the live "is the device secure?" question
//! and drives the interactive setup flow when it is not.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::host::CredentialHost;
use super::reauth::{ChallengeBroker, SET_CREDENTIAL_REQUEST_CODE};
use crate::error::{Error, Result};

/// Checks and, interactively, establishes device security.
pub struct DeviceGate {
    host: Arc<dyn CredentialHost>,
    broker: Arc<ChallengeBroker>,
}

impl DeviceGate {
    pub fn new(host: Arc<dyn CredentialHost>, broker: Arc<ChallengeBroker>) -> Self {
        Self { host, broker }
    }

    /// Live query of the lock-screen credential state.
    pub fn is_device_secure(&self) -> bool {
        self.host.is_device_secure()
    }

    /// Walk the user through configuring a lock-screen credential.
    ///
    /// Already-secure devices resolve `true` immediately, without any UI.
    /// Otherwise the user first confirms via a dialog (dismissal is
    /// `Err(UserCancelledSetup)`), then the platform's set-credential flow
    /// runs. A granted flow resolves to a fresh `is_device_secure()` query;
    /// an outright cancelled flow resolves `false` without re-checking.
    pub async fn request_security_setup(
        &self,
        description: &str,
        action_label: &str,
    ) -> Result<bool> {
        if self.is_device_secure() {
            debug!("device already secure, skipping setup");
            return Ok(true);
        }

        if !self.host.confirm_setup(description, action_label).await {
            info!("user dismissed the security setup dialog");
            return Err(Error::UserCancelledSetup);
        }

        let rx = self.broker.register(SET_CREDENTIAL_REQUEST_CODE)?;
        if !self.host.open_set_credential_flow() {
            warn!("no foreground context to launch the set-credential flow");
            self.broker.unregister(SET_CREDENTIAL_REQUEST_CODE);
            return Err(Error::BackendUnavailable(
                "cannot launch the set-credential flow".into(),
            ));
        }

        match rx.await {
            Ok(true) => {
                let secure = self.is_device_secure();
                info!("set-credential flow finished, device secure: {}", secure);
                Ok(secure)
            }
            Ok(false) => {
                info!("user cancelled the set-credential flow");
                Ok(false)
            }
            Err(_) => Err(Error::UserCancelledSetup),
        }
    }
}
