use async_trait::async_trait;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiometricKind {
    Fingerprint,
    FacialRecognition,
    Iris,
}

impl fmt::Display for BiometricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiometricKind::Fingerprint => write!(f, "Fingerprint"),
            BiometricKind::FacialRecognition => write!(f, "Face"),
            BiometricKind::Iris => write!(f, "Iris"),
        }
    }
}

/// Text shown by the platform's biometric prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    pub message: String,
    pub fallback_label: String,
    pub cancel_label: String,
}

impl PromptOptions {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fallback_label: "Use password".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Success,
    /// The user dismissed the prompt or chose the fallback.
    Cancelled,
    /// No match, lockout, or another sensor-reported failure.
    Failed(String),
}

impl PromptOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, PromptOutcome::Success)
    }
}

/// Platform biometric capability.
#[async_trait]
pub trait BiometricSensor: Send + Sync {
    async fn has_hardware(&self) -> Result<bool>;
    async fn is_enrolled(&self) -> Result<bool>;
    async fn supported_kinds(&self) -> Result<Vec<BiometricKind>>;
    async fn prompt(&self, options: &PromptOptions) -> Result<PromptOutcome>;
}

/// Sensor for platforms without biometric support: no hardware, never succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSensor;

#[async_trait]
impl BiometricSensor for UnavailableSensor {
    async fn has_hardware(&self) -> Result<bool> {
        Ok(false)
    }

    async fn is_enrolled(&self) -> Result<bool> {
        Ok(false)
    }

    async fn supported_kinds(&self) -> Result<Vec<BiometricKind>> {
        Ok(Vec::new())
    }

    async fn prompt(&self, _options: &PromptOptions) -> Result<PromptOutcome> {
        Ok(PromptOutcome::Failed("Biometric authentication is not available".to_string()))
    }
}

/// Username/password pair released by a successful biometric prompt.
///
/// Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct BiometricCredentials {
    pub username: String,
    pub password: String,
}

impl BiometricCredentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BiometricCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BiometricCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
