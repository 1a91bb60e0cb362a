use crate::commands::{Command, HELP};
use crate::sensor::StandInSensor;
use crate::{Cli, SecretsBackend};
use async_trait::async_trait;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use wallet_session::{
    BiometricCredentialVault, BiometricCredentials, FileStore, KeyValueStore, KeyringStore, LifecycleController,
    LifecycleSignal, LogoutHandler, MonitorPhase, SecretStore, SessionTimeoutMonitor, SystemClock,
    TimeoutConfigUpdate,
};

const KEYRING_SERVICE: &str = "wallet-shell";

/// Marks the shell signed out when the monitor fires.
struct ShellLogout {
    signed_in: Arc<AtomicBool>,
}

#[async_trait]
impl LogoutHandler for ShellLogout {
    async fn on_logout(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.signed_in.store(false, Ordering::SeqCst);
        println!("⏱  Session expired: you have been logged out due to inactivity.");
        Ok(())
    }
}

/// File-backed secrets for machines without an OS keychain. Not encrypted.
struct PlainFileSecrets(FileStore);

#[async_trait]
impl SecretStore for PlainFileSecrets {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.0.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.0.remove(key).await
    }
}

pub struct App {
    monitor: SessionTimeoutMonitor,
    lifecycle: LifecycleController,
    vault: BiometricCredentialVault,
    signed_in: Arc<AtomicBool>,
}

impl App {
    /// Builds the stores and both session components from the command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or created.
    pub fn open(cli: &Cli) -> Result<Self> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => default_data_dir()?,
        };
        info!("Using data directory {}", data_dir.display());

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(data_dir.join("session.json"))?);
        let secrets = open_secrets(cli.secrets, &data_dir)?;

        let (signal, lifecycle) = LifecycleSignal::channel();
        let monitor = SessionTimeoutMonitor::new(store, signal, Arc::new(SystemClock));
        let vault = BiometricCredentialVault::new(secrets, Arc::new(StandInSensor::new(cli.sensor)));

        Ok(Self {
            monitor,
            lifecycle,
            vault,
            signed_in: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Runs until `quit` or end of input, then disposes the monitor.
    ///
    /// # Errors
    ///
    /// Returns an error if reading standard input fails.
    pub async fn run(&self, timeout_minutes: Option<u32>) -> Result<()> {
        if let Some(minutes) = timeout_minutes {
            if !self.monitor.update_config(TimeoutConfigUpdate::timeout_minutes(minutes)).await {
                return Err(eyre!("Invalid timeout of {minutes} minutes (expected 1-60)"));
            }
        }

        self.monitor
            .initialize(Arc::new(ShellLogout {
                signed_in: Arc::clone(&self.signed_in),
            }))
            .await;

        println!("Wallet shell ready. Type 'help' for commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.into()),
            };

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    println!("❌ {e}");
                    continue;
                }
            };

            if command.is_interaction() {
                self.monitor.record_activity();
            }
            if command == Command::Quit {
                break Ok(());
            }
            self.handle(command).await;
        };

        self.monitor.cleanup();
        self.monitor.flush_activity().await;
        info!("Wallet shell stopped");
        result
    }

    async fn handle(&self, command: Command) {
        match command {
            Command::Tap => println!("👆 Activity recorded"),
            Command::Status => self.print_status().await,
            Command::Lifecycle(state) => {
                self.lifecycle.transition(state);
                println!("📱 App is now {state}");
            }
            Command::Timeout(minutes) => {
                if self.monitor.update_config(TimeoutConfigUpdate::timeout_minutes(minutes)).await {
                    println!("✅ Auto-logout after {minutes} minutes of inactivity");
                } else {
                    println!("❌ Timeout must be between 1 and 60 minutes");
                }
            }
            Command::AutoLogout(enabled) => {
                if self.monitor.update_config(TimeoutConfigUpdate::enabled(enabled)).await {
                    println!("✅ Auto-logout {}", if enabled { "enabled" } else { "disabled" });
                } else {
                    println!("❌ Failed to save auto-logout setting");
                }
            }
            Command::BioEnable { username } => self.enroll(username).await,
            Command::BioLogin => match self.vault.authenticate_with_biometric().await {
                Some(credentials) => {
                    self.signed_in.store(true, Ordering::SeqCst);
                    self.monitor.record_activity();
                    println!("✅ Signed in as {} with biometric", credentials.username);
                }
                None => println!("❌ Biometric login failed. Please try again or use password login."),
            },
            Command::BioUpdate { username } => {
                let Some(credentials) = read_credentials(username).await else {
                    return;
                };
                if self.vault.update_credentials(&credentials).await {
                    println!("✅ Biometric credentials updated");
                } else {
                    println!("❌ Biometric login is not enabled");
                }
            }
            Command::BioDisable => {
                if self.vault.disable_biometric().await {
                    println!("✅ Biometric login disabled");
                } else {
                    println!("❌ Failed to disable biometric login");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
    }

    async fn enroll(&self, username: String) {
        if !self.vault.is_biometric_available().await {
            println!("❌ Biometric authentication is not available on this device");
            return;
        }
        let Some(credentials) = read_credentials(username).await else {
            return;
        };
        if self.vault.enable_biometric(&credentials).await {
            println!("✅ Biometric login has been enabled");
        } else {
            println!("❌ Failed to enable biometric login. Please try again.");
        }
    }

    async fn print_status(&self) {
        let signed_in = self.signed_in.load(Ordering::SeqCst);
        let config = self.monitor.get_config().await;
        let remaining = self.monitor.get_remaining_time().await;

        println!("Session:        {}", if signed_in { "signed in" } else { "signed out" });
        println!(
            "App state:      {}",
            if self.monitor.is_foreground() { "foreground" } else { "background" }
        );
        println!(
            "Auto-logout:    {} ({} min)",
            if config.enabled { "on" } else { "off" },
            config.timeout_minutes
        );
        match self.monitor.phase() {
            MonitorPhase::Armed { .. } if remaining >= 0 => {
                println!("Logout in:      {}s", remaining / 1000);
            }
            phase => println!("Timer:          {phase:?}"),
        }
        if self.monitor.is_about_to_logout().await {
            println!("⚠️  You will be logged out soon. Tap to stay signed in.");
        }

        let kinds = self.vault.supported_biometric_kinds().await;
        let kinds = if kinds.is_empty() {
            "none".to_string()
        } else {
            kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        };
        println!(
            "Biometric:      {} (available: {}, sensors: {kinds})",
            if self.vault.is_biometric_enabled().await { "enabled" } else { "disabled" },
            self.vault.is_biometric_available().await
        );
    }
}

/// Prompts for the password without echo. `None` if the prompt failed.
async fn read_credentials(username: String) -> Option<BiometricCredentials> {
    let prompt = format!("Password for {username}: ");
    match tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt)).await {
        Ok(Ok(password)) => Some(BiometricCredentials::new(username, password)),
        Ok(Err(e)) => {
            println!("❌ Could not read password: {e}");
            None
        }
        Err(e) => {
            warn!("Password prompt task failed: {e}");
            None
        }
    }
}

fn open_secrets(backend: SecretsBackend, data_dir: &Path) -> Result<Arc<dyn SecretStore>> {
    let secrets: Arc<dyn SecretStore> = match backend {
        SecretsBackend::Keyring => Arc::new(KeyringStore::new(KEYRING_SERVICE)),
        SecretsBackend::File => {
            warn!("Storing biometric credentials unencrypted in {}", data_dir.display());
            Arc::new(PlainFileSecrets(FileStore::open(data_dir.join("secrets.json"))?))
        }
    };
    Ok(secrets)
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("wallet-shell"))
        .ok_or_else(|| eyre!("Could not determine a data directory; pass --data-dir"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::sensor::SensorMode;
    use tempfile::TempDir;
    use wallet_session::keys;

    fn cli_for(dir: &TempDir) -> Cli {
        Cli {
            data_dir: Some(dir.path().to_path_buf()),
            timeout_minutes: None,
            sensor: SensorMode::Accept,
            secrets: SecretsBackend::File,
        }
    }

    #[tokio::test]
    async fn test_open_with_file_backends() {
        let dir = TempDir::new().unwrap();
        let app = App::open(&cli_for(&dir)).unwrap();

        assert!(app.vault.is_biometric_available().await);
        assert!(!app.vault.is_biometric_enabled().await);

        assert!(
            app.vault
                .enable_biometric(&BiometricCredentials::new("alice", "pw"))
                .await
        );
        let secrets = std::fs::read_to_string(dir.path().join("secrets.json")).unwrap();
        assert!(secrets.contains(keys::BIOMETRIC_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_logout_handler_signs_out() {
        let signed_in = Arc::new(AtomicBool::new(true));
        let handler = ShellLogout {
            signed_in: Arc::clone(&signed_in),
        };
        handler.on_logout().await.unwrap();
        assert!(!signed_in.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_lifecycle_commands_reach_monitor() {
        let dir = TempDir::new().unwrap();
        let app = App::open(&cli_for(&dir)).unwrap();
        app.monitor
            .initialize(Arc::new(ShellLogout {
                signed_in: Arc::clone(&app.signed_in),
            }))
            .await;

        app.handle(Command::Lifecycle(wallet_session::AppLifecycle::Background))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!app.monitor.is_foreground());

        app.handle(Command::Timeout(5)).await;
        assert_eq!(app.monitor.get_config().await.timeout_minutes, 5);
        app.monitor.cleanup();
    }
}
