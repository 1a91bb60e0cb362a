//! Session lifecycle for the wallet client.
//!
//! Two independent components guard access to the authenticated session:
//!
//! - [`SessionTimeoutMonitor`] logs the user out after a period of inactivity
//!   while the app is in the foreground.
//! - [`BiometricCredentialVault`] keeps a username/password pair behind a
//!   biometric prompt so the user can sign back in without retyping it.
//!
//! Storage, the biometric sensor, the clock and the app-lifecycle signal are
//! injected, so every instance is self-contained.

mod activity;
pub mod biometric;
pub mod clock;
pub mod config;
pub mod keyring_store;
pub mod lifecycle;
pub mod monitor;
pub mod store;
pub mod vault;

pub use biometric::{
    BiometricCredentials, BiometricKind, BiometricSensor, PromptOptions, PromptOutcome, UnavailableSensor,
};
pub use clock::{Clock, SystemClock};
pub use config::{TimeoutConfig, TimeoutConfigUpdate};
pub use keyring_store::KeyringStore;
pub use lifecycle::{AppLifecycle, LifecycleController, LifecycleSignal};
pub use monitor::{LOGOUT_WARNING_WINDOW_MS, LogoutHandler, MonitorPhase, SessionTimeoutMonitor};
pub use store::{FileStore, KeyValueStore, MemoryStore, SecretStore};
pub use vault::BiometricCredentialVault;

/// Storage keys owned by this crate.
pub mod keys {
    /// JSON-encoded [`TimeoutConfig`](crate::TimeoutConfig).
    pub const TIMEOUT_CONFIG: &str = "auto_logout_config";
    /// Epoch millis of the last user activity, as a decimal string.
    pub const LAST_ACTIVITY: &str = "last_activity";
    /// Bearer token written by the login flow; removed on auto-logout.
    pub const AUTH_TOKEN: &str = "authToken";
    /// `"true"` / `"false"`, in the secret store.
    pub const BIOMETRIC_ENABLED: &str = "biometric_enabled";
    /// JSON-encoded [`BiometricCredentials`](crate::BiometricCredentials), in the secret store.
    pub const BIOMETRIC_CREDENTIALS: &str = "biometric_credentials";
}
