use serde::{Deserialize, Serialize};

/// Shortest inactivity window accepted by the settings screen.
pub const MIN_TIMEOUT_MINUTES: u32 = 1;
/// Longest inactivity window accepted by the settings screen.
pub const MAX_TIMEOUT_MINUTES: u32 = 60;
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 15;

/// Auto-logout settings, persisted as JSON under [`crate::keys::TIMEOUT_CONFIG`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutConfig {
    pub timeout_minutes: u32,
    pub enabled: bool,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            enabled: true,
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub const fn timeout_millis(&self) -> i64 {
        self.timeout_minutes as i64 * 60_000
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.timeout_minutes >= MIN_TIMEOUT_MINUTES && self.timeout_minutes <= MAX_TIMEOUT_MINUTES
    }

    /// Pulls an out-of-range timeout back into the accepted window.
    ///
    /// Used when loading a config written by an older build; explicit
    /// updates are rejected instead.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            timeout_minutes: self.timeout_minutes.clamp(MIN_TIMEOUT_MINUTES, MAX_TIMEOUT_MINUTES),
            ..self
        }
    }

    /// Merges a partial update over this config.
    #[must_use]
    pub fn merge(self, update: TimeoutConfigUpdate) -> Self {
        Self {
            timeout_minutes: update.timeout_minutes.unwrap_or(self.timeout_minutes),
            enabled: update.enabled.unwrap_or(self.enabled),
        }
    }
}

/// Partial [`TimeoutConfig`]; `None` fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutConfigUpdate {
    pub timeout_minutes: Option<u32>,
    pub enabled: Option<bool>,
}

impl TimeoutConfigUpdate {
    #[must_use]
    pub const fn timeout_minutes(minutes: u32) -> Self {
        Self {
            timeout_minutes: Some(minutes),
            enabled: None,
        }
    }

    #[must_use]
    pub const fn enabled(enabled: bool) -> Self {
        Self {
            timeout_minutes: None,
            enabled: Some(enabled),
        }
    }
}
