use color_eyre::Result;
use color_eyre::eyre::{bail, eyre};
use std::str::FromStr;
use wallet_session::AppLifecycle;

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tap,
    Status,
    Lifecycle(AppLifecycle),
    Timeout(u32),
    AutoLogout(bool),
    BioEnable { username: String },
    BioLogin,
    BioUpdate { username: String },
    BioDisable,
    Help,
    Quit,
}

impl Command {
    /// Lifecycle transitions are platform events, not user interactions.
    pub const fn is_interaction(&self) -> bool {
        !matches!(self, Command::Lifecycle(_) | Command::Quit)
    }
}

impl FromStr for Command {
    type Err = color_eyre::Report;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(Command::Tap);
        };
        let arg = words.next();
        if words.next().is_some() {
            bail!("Too many arguments for '{name}'");
        }

        let command = match (name.to_lowercase().as_str(), arg) {
            ("tap", None) => Command::Tap,
            ("status" | "st", None) => Command::Status,
            ("background" | "bg", None) => Command::Lifecycle(AppLifecycle::Background),
            ("inactive", None) => Command::Lifecycle(AppLifecycle::Inactive),
            ("foreground" | "fg", None) => Command::Lifecycle(AppLifecycle::Foreground),
            ("timeout", Some(minutes)) => Command::Timeout(
                minutes
                    .parse()
                    .map_err(|_| eyre!("Timeout must be a whole number of minutes, got '{minutes}'"))?,
            ),
            ("autologout", Some("on")) => Command::AutoLogout(true),
            ("autologout", Some("off")) => Command::AutoLogout(false),
            ("bio-enable", Some(username)) => Command::BioEnable {
                username: username.to_string(),
            },
            ("bio-login", None) => Command::BioLogin,
            ("bio-update", Some(username)) => Command::BioUpdate {
                username: username.to_string(),
            },
            ("bio-disable", None) => Command::BioDisable,
            ("help" | "?", None) => Command::Help,
            ("quit" | "exit" | "q", None) => Command::Quit,
            (other, _) => bail!("Unknown command '{other}'. Type 'help' for a list of commands."),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
Commands:
  tap                    simulate a user interaction (an empty line works too)
  status                 show session and biometric state
  background | inactive  send the app to the background
  foreground             bring the app back
  timeout <1-60>         set the inactivity timeout in minutes
  autologout on|off      enable or disable auto-logout
  bio-enable <username>  enroll credentials behind the biometric prompt
  bio-login              sign in with the biometric prompt
  bio-update <username>  replace the enrolled password
  bio-disable            remove enrolled credentials
  quit                   exit";
