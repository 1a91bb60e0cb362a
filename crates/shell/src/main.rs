mod app;
mod commands;
mod sensor;

use crate::app::App;
use crate::sensor::SensorMode;
use clap::{Parser, ValueEnum};
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Where biometric credentials are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SecretsBackend {
    /// The operating system keychain.
    Keyring,
    /// A plain JSON file in the data directory.
    File,
}

#[derive(Parser, Debug)]
#[command(
    name = "wallet-shell",
    about = "Interactive shell around the wallet session lifecycle",
    long_about = "Drives the wallet's session components from a terminal. Every command you type \
                  counts as user activity; 'background' and 'foreground' simulate the app moving \
                  between states. Leave the shell idle past the timeout and the session expires.\n\n\
                  Quick start:\n\
                  1. wallet-shell --timeout-minutes 1   # Short timeout for trying it out\n\
                  2. status                             # See the countdown\n\
                  3. bio-enable alice                   # Enroll credentials behind biometrics"
)]
pub struct Cli {
    #[arg(long, help = "Directory for session state (defaults to the platform data directory)")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, help = "Set the inactivity timeout in minutes (1-60) before starting")]
    pub timeout_minutes: Option<u32>,

    #[arg(long, value_enum, default_value_t = SensorMode::Accept, help = "How the simulated biometric sensor answers")]
    pub sensor: SensorMode,

    #[arg(long, value_enum, default_value_t = SecretsBackend::Keyring, help = "Where biometric credentials are stored")]
    pub secrets: SecretsBackend,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let app = App::open(&cli)?;
    app.run(cli.timeout_minutes).await
}
