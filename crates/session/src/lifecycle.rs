use std::fmt;
use tokio::sync::watch;

/// App-lifecycle transitions delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppLifecycle {
    Foreground,
    Background,
    /// Transitional state (task switcher, incoming call). Treated like `Background`.
    Inactive,
}

impl AppLifecycle {
    #[must_use]
    pub const fn is_foreground(self) -> bool {
        matches!(self, AppLifecycle::Foreground)
    }
}

impl fmt::Display for AppLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppLifecycle::Foreground => write!(f, "foreground"),
            AppLifecycle::Background => write!(f, "background"),
            AppLifecycle::Inactive => write!(f, "inactive"),
        }
    }
}

/// Receiving side of the lifecycle signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LifecycleSignal {
    rx: watch::Receiver<AppLifecycle>,
}

/// Sending side, held by whatever owns the platform integration.
#[derive(Debug)]
pub struct LifecycleController {
    tx: watch::Sender<AppLifecycle>,
}

impl LifecycleSignal {
    /// Creates a signal that starts in the foreground.
    #[must_use]
    pub fn channel() -> (Self, LifecycleController) {
        let (tx, rx) = watch::channel(AppLifecycle::Foreground);
        (Self { rx }, LifecycleController { tx })
    }

    #[must_use]
    pub fn current(&self) -> AppLifecycle {
        *self.rx.borrow()
    }

    /// A fresh receiver that only reports transitions made after this call.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppLifecycle> {
        let mut rx = self.rx.clone();
        rx.mark_unchanged();
        rx
    }
}

impl LifecycleController {
    /// Publishes a transition. Repeating the current state is not a transition.
    pub fn transition(&self, state: AppLifecycle) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    #[must_use]
    pub fn current(&self) -> AppLifecycle {
        *self.tx.borrow()
    }
}
