use crate::biometric::{BiometricCredentials, BiometricKind, BiometricSensor, PromptOptions, PromptOutcome};
use crate::keys;
use crate::store::SecretStore;
use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const ENABLE_PROMPT: &str = "Authenticate to enable biometric login";
const LOGIN_PROMPT: &str = "Login with biometric";

/// Biometric-gated storage for one username/password pair.
///
/// Fail-closed: any sensor or storage error is reported as "not enabled",
/// "not authenticated" or "not stored", never as success. The enabled flag is
/// only ever `true` while a credential blob is stored.
pub struct BiometricCredentialVault {
    store: Arc<dyn SecretStore>,
    sensor: Arc<dyn BiometricSensor>,
}

impl BiometricCredentialVault {
    pub fn new(store: Arc<dyn SecretStore>, sensor: Arc<dyn BiometricSensor>) -> Self {
        Self { store, sensor }
    }

    /// True iff the device has a biometric sensor with at least one enrolled factor.
    pub async fn is_biometric_available(&self) -> bool {
        self.check_capability().await.unwrap_or_else(|e| {
            warn!("Error checking biometric availability: {e}");
            false
        })
    }

    pub async fn supported_biometric_kinds(&self) -> Vec<BiometricKind> {
        self.sensor.supported_kinds().await.unwrap_or_else(|e| {
            warn!("Error getting supported biometric types: {e}");
            Vec::new()
        })
    }

    pub async fn is_biometric_enabled(&self) -> bool {
        match self.store.get(keys::BIOMETRIC_ENABLED).await {
            Ok(flag) => flag.as_deref() == Some("true"),
            Err(e) => {
                warn!("Error checking biometric enabled status: {e}");
                false
            }
        }
    }

    /// Prompts the sensor and, on success, stores `credentials` and turns
    /// biometric login on.
    ///
    /// The caller must already have verified the credentials (e.g. by logging
    /// in with them). Returns `false` with the previous state intact on
    /// cancel, sensor failure or storage error.
    pub async fn enable_biometric(&self, credentials: &BiometricCredentials) -> bool {
        if !self.prompt(ENABLE_PROMPT).await {
            return false;
        }
        match self.store_and_enable(credentials).await {
            Ok(()) => {
                info!("Biometric login enabled");
                true
            }
            Err(e) => {
                warn!("Error enabling biometric: {e}");
                false
            }
        }
    }

    /// Turns biometric login off and deletes the stored credentials.
    /// Idempotent.
    pub async fn disable_biometric(&self) -> bool {
        match self.clear_enrollment().await {
            Ok(()) => {
                info!("Biometric login disabled");
                true
            }
            Err(e) => {
                warn!("Error disabling biometric: {e}");
                false
            }
        }
    }

    /// Prompts the sensor and returns the stored credentials on success.
    ///
    /// Returns `None` without prompting when biometric login is off, and
    /// `None` on any failure along the way.
    pub async fn authenticate_with_biometric(&self) -> Option<BiometricCredentials> {
        if !self.is_biometric_enabled().await {
            return None;
        }
        if !self.prompt(LOGIN_PROMPT).await {
            return None;
        }

        match self.load_credentials().await {
            Ok(Some(credentials)) => Some(credentials),
            Ok(None) => {
                warn!("Biometric login is enabled but no credentials are stored");
                None
            }
            Err(e) => {
                warn!("Error reading biometric credentials: {e}");
                None
            }
        }
    }

    /// Replaces the stored credentials, e.g. after a password change.
    /// No-op returning `false` unless biometric login is enabled.
    pub async fn update_credentials(&self, credentials: &BiometricCredentials) -> bool {
        if !self.is_biometric_enabled().await {
            return false;
        }
        match self.write_credentials(credentials).await {
            Ok(()) => {
                debug!("Biometric credentials updated");
                true
            }
            Err(e) => {
                warn!("Error updating biometric credentials: {e}");
                false
            }
        }
    }

    async fn check_capability(&self) -> Result<bool> {
        Ok(self.sensor.has_hardware().await? && self.sensor.is_enrolled().await?)
    }

    async fn prompt(&self, message: &str) -> bool {
        match self.sensor.prompt(&PromptOptions::new(message)).await {
            Ok(PromptOutcome::Success) => true,
            Ok(PromptOutcome::Cancelled) => {
                debug!("Biometric prompt cancelled");
                false
            }
            Ok(PromptOutcome::Failed(reason)) => {
                debug!("Biometric prompt failed: {reason}");
                false
            }
            Err(e) => {
                warn!("Biometric prompt error: {e}");
                false
            }
        }
    }

    /// Blob first, then flag. If the flag cannot be written, the previous blob
    /// is put back so a failed enable leaves nothing behind.
    async fn store_and_enable(&self, credentials: &BiometricCredentials) -> Result<()> {
        let previous = self.store.get(keys::BIOMETRIC_CREDENTIALS).await?.map(Zeroizing::new);
        self.write_credentials(credentials).await?;

        if let Err(e) = self.store.set(keys::BIOMETRIC_ENABLED, "true").await {
            let restored = match previous.as_deref() {
                Some(blob) => self.store.set(keys::BIOMETRIC_CREDENTIALS, blob).await,
                None => self.store.remove(keys::BIOMETRIC_CREDENTIALS).await,
            };
            if let Err(restore_err) = restored {
                warn!("Failed to roll back biometric credentials: {restore_err}");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn clear_enrollment(&self) -> Result<()> {
        // Flag first: enabled must never outlive the blob.
        self.store.set(keys::BIOMETRIC_ENABLED, "false").await?;
        self.store.remove(keys::BIOMETRIC_CREDENTIALS).await
    }

    async fn write_credentials(&self, credentials: &BiometricCredentials) -> Result<()> {
        let blob = Zeroizing::new(serde_json::to_string(credentials)?);
        self.store.set(keys::BIOMETRIC_CREDENTIALS, &blob).await
    }

    async fn load_credentials(&self) -> Result<Option<BiometricCredentials>> {
        let Some(blob) = self.store.get(keys::BIOMETRIC_CREDENTIALS).await?.map(Zeroizing::new) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&blob)?))
    }
}
