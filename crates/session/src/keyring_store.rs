use crate::store::SecretStore;
use async_trait::async_trait;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use keyring::Entry;

/// [`SecretStore`] backed by the OS credential store (Keychain, Credential
/// Manager, kernel keyutils). Each key becomes one entry under `service`.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    /// Runs a blocking keyring call off the async executor.
    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key).wrap_err("Failed to create keyring entry")?;
            op(entry)
        })
        .await
        .map_err(|e| eyre!("Keyring task failed: {e}"))?
    }
}

#[async_trait]
impl SecretStore for KeyringStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(eyre!("Failed to read from keyring: {e}")),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = zeroize::Zeroizing::new(value.to_string());
        self.with_entry(key, move |entry| {
            entry
                .set_password(&value)
                .wrap_err("Failed to store secret in keyring")
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(eyre!("Failed to delete keyring entry: {e}")),
        })
        .await
    }
}
