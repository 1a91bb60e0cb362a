use async_trait::async_trait;
use clap::ValueEnum;
use color_eyre::Result;
use tracing::info;
use wallet_session::{BiometricKind, BiometricSensor, PromptOptions, PromptOutcome};

/// How the stand-in sensor answers prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SensorMode {
    /// Enrolled fingerprint that always matches.
    Accept,
    /// Enrolled fingerprint that never matches.
    Reject,
    /// No biometric hardware.
    Absent,
}

/// Terminal stand-in for the device's biometric sensor.
#[derive(Debug, Clone, Copy)]
pub struct StandInSensor {
    mode: SensorMode,
}

impl StandInSensor {
    pub const fn new(mode: SensorMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl BiometricSensor for StandInSensor {
    async fn has_hardware(&self) -> Result<bool> {
        Ok(self.mode != SensorMode::Absent)
    }

    async fn is_enrolled(&self) -> Result<bool> {
        Ok(self.mode != SensorMode::Absent)
    }

    async fn supported_kinds(&self) -> Result<Vec<BiometricKind>> {
        Ok(match self.mode {
            SensorMode::Absent => Vec::new(),
            SensorMode::Accept | SensorMode::Reject => vec![BiometricKind::Fingerprint],
        })
    }

    async fn prompt(&self, options: &PromptOptions) -> Result<PromptOutcome> {
        info!(
            "Biometric prompt: {} [{} / {}]",
            options.message, options.fallback_label, options.cancel_label
        );
        Ok(match self.mode {
            SensorMode::Accept => PromptOutcome::Success,
            SensorMode::Reject => PromptOutcome::Failed("Fingerprint not recognized".to_string()),
            SensorMode::Absent => PromptOutcome::Failed("No biometric hardware".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test]
    async fn test_modes() {
        let options = PromptOptions::new("test");

        let accept = StandInSensor::new(SensorMode::Accept);
        assert!(accept.has_hardware().await.unwrap());
        assert!(accept.prompt(&options).await.unwrap().is_success());

        let reject = StandInSensor::new(SensorMode::Reject);
        assert!(reject.is_enrolled().await.unwrap());
        assert!(!reject.prompt(&options).await.unwrap().is_success());

        let absent = StandInSensor::new(SensorMode::Absent);
        assert!(!absent.has_hardware().await.unwrap());
        assert!(absent.supported_kinds().await.unwrap().is_empty());
    }
}
