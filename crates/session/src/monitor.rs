use crate::activity::ActivityLog;
use crate::clock::Clock;
use crate::config::{TimeoutConfig, TimeoutConfigUpdate};
use crate::keys;
use crate::lifecycle::{AppLifecycle, LifecycleSignal};
use crate::store::KeyValueStore;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

/// Remaining time below which [`SessionTimeoutMonitor::is_about_to_logout`] reports true.
pub const LOGOUT_WARNING_WINDOW_MS: i64 = 30_000;

/// Caller-supplied reaction to an inactivity logout (typically: drop
/// credentials and navigate back to the entry screen).
#[async_trait]
pub trait LogoutHandler: Send + Sync {
    async fn on_logout(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Observable state of the monitor's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// Not initialized, or cleaned up.
    Uninitialized,
    /// Initialized but nothing is counting down: the feature is disabled, or
    /// the deadline passed while the app was in the background.
    Disarmed,
    /// A logout is scheduled for `deadline` (epoch millis).
    Armed { deadline: i64 },
    /// The logout fired; nothing is scheduled until the next activity.
    Fired,
}

enum TimerState {
    Uninitialized,
    Disarmed,
    Armed {
        deadline: i64,
        generation: u64,
        handle: JoinHandle<()>,
    },
    Fired,
}

impl TimerState {
    fn is_current(&self, expected: u64) -> bool {
        matches!(self, TimerState::Armed { generation, .. } if *generation == expected)
    }
}

struct Runtime {
    timer: TimerState,
    config: TimeoutConfig,
    handler: Option<Arc<dyn LogoutHandler>>,
    listener: Option<JoinHandle<()>>,
    foreground: bool,
    generation: u64,
}

impl Runtime {
    fn cancel_timer(&mut self) {
        if let TimerState::Armed { handle, .. } = &self.timer {
            handle.abort();
        }
    }
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    lifecycle: LifecycleSignal,
    activity: ActivityLog,
    runtime: Mutex<Runtime>,
}

/// Inactivity auto-logout.
///
/// Tracks the last user activity and invokes the [`LogoutHandler`] once the
/// configured timeout elapses with the app in the foreground. Cloning yields
/// another handle to the same monitor.
///
/// Policy on resume: if the timeout already elapsed while the app was in the
/// background, returning to the foreground logs out immediately. Otherwise the
/// resume counts as activity and restarts the countdown.
#[derive(Clone)]
pub struct SessionTimeoutMonitor {
    inner: Arc<Inner>,
}

impl SessionTimeoutMonitor {
    /// Creates a monitor. Must be called from within a tokio runtime, since the
    /// activity writer task is spawned here.
    pub fn new(store: Arc<dyn KeyValueStore>, lifecycle: LifecycleSignal, clock: Arc<dyn Clock>) -> Self {
        let foreground = lifecycle.current().is_foreground();
        let inner = Inner {
            activity: ActivityLog::spawn(Arc::clone(&store)),
            store,
            clock,
            lifecycle,
            runtime: Mutex::new(Runtime {
                timer: TimerState::Uninitialized,
                config: TimeoutConfig::default(),
                handler: None,
                listener: None,
                foreground,
                generation: 0,
            }),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Installs the logout handler, subscribes to lifecycle transitions,
    /// records an initial activity and arms the timer.
    ///
    /// Calling it again replaces the handler and re-arms; the previous
    /// lifecycle subscription is dropped rather than duplicated.
    pub async fn initialize(&self, handler: Arc<dyn LogoutHandler>) {
        self.inner.load_config().await;
        {
            let mut rt = self.inner.lock();
            rt.handler = Some(handler);
            if let Some(previous) = rt.listener.take() {
                previous.abort();
            }
            rt.foreground = self.inner.lifecycle.current().is_foreground();
            rt.listener = Some(spawn_listener(&self.inner));
        }
        info!("Auto-logout monitor initialized");
        self.record_activity();
    }

    /// Cancels any pending logout, drops the lifecycle subscription and the
    /// handler. Safe to call in any state.
    pub fn cleanup(&self) {
        let mut rt = self.inner.lock();
        rt.cancel_timer();
        rt.timer = TimerState::Uninitialized;
        if let Some(listener) = rt.listener.take() {
            listener.abort();
        }
        rt.handler = None;
        info!("Auto-logout monitor stopped");
    }

    /// Marks the user as active now and restarts the countdown.
    ///
    /// Returns immediately; the timestamp is persisted in the background.
    /// Before [`initialize`](Self::initialize) only the timestamp is kept.
    pub fn record_activity(&self) {
        let now = self.inner.clock.now_millis();
        self.inner.activity.record(now);

        let mut rt = self.inner.lock();
        if rt.handler.is_some() {
            self.inner.rearm(&mut rt, now);
        }
    }

    /// Persisted config, or the default when none is stored.
    pub async fn get_config(&self) -> TimeoutConfig {
        self.inner.load_config().await
    }

    /// Merges `update` into the persisted config and re-arms with the result.
    ///
    /// Returns `false`, leaving config and timer untouched, if the merged
    /// timeout is out of range or the config could not be persisted.
    pub async fn update_config(&self, update: TimeoutConfigUpdate) -> bool {
        let next = self.inner.load_config().await.merge(update);
        if !next.is_valid() {
            warn!("Rejecting auto-logout timeout of {} minutes", next.timeout_minutes);
            return false;
        }

        let json = match serde_json::to_string(&next) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode auto-logout config: {e}");
                return false;
            }
        };
        if let Err(e) = self.inner.store.set(keys::TIMEOUT_CONFIG, &json).await {
            warn!("Failed to persist auto-logout config: {e}");
            return false;
        }

        let last_activity = self.inner.last_activity().await;
        let mut rt = self.inner.lock();
        rt.config = next;
        if rt.handler.is_some() {
            self.inner.rearm(&mut rt, last_activity);
        }
        info!(
            enabled = next.enabled,
            timeout_minutes = next.timeout_minutes,
            "Auto-logout config updated"
        );
        true
    }

    /// Milliseconds until logout, `0` if overdue, `-1` if the feature is disabled.
    pub async fn get_remaining_time(&self) -> i64 {
        let config = self.inner.load_config().await;
        if !config.enabled {
            return -1;
        }
        let now = self.inner.clock.now_millis();
        let last_activity = self.inner.activity.last_activity(now).await;
        (config.timeout_millis() - (now - last_activity)).max(0)
    }

    /// True when a logout is at most [`LOGOUT_WARNING_WINDOW_MS`] away.
    pub async fn is_about_to_logout(&self) -> bool {
        let remaining = self.get_remaining_time().await;
        remaining > 0 && remaining <= LOGOUT_WARNING_WINDOW_MS
    }

    /// Last recorded activity in epoch millis; now if nothing is recorded.
    pub async fn last_activity(&self) -> i64 {
        self.inner.last_activity().await
    }

    /// Waits until the latest activity timestamp has reached the store.
    pub async fn flush_activity(&self) {
        self.inner.activity.flush().await;
    }

    pub fn phase(&self) -> MonitorPhase {
        match &self.inner.lock().timer {
            TimerState::Uninitialized => MonitorPhase::Uninitialized,
            TimerState::Disarmed => MonitorPhase::Disarmed,
            TimerState::Armed { deadline, .. } => MonitorPhase::Armed { deadline: *deadline },
            TimerState::Fired => MonitorPhase::Fired,
        }
    }

    pub fn is_foreground(&self) -> bool {
        self.inner.lock().foreground
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Runtime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn last_activity(&self) -> i64 {
        self.activity.last_activity(self.clock.now_millis()).await
    }

    /// Reads the persisted config into the cache. Missing means default; a
    /// failed or unparsable read keeps the cached value.
    async fn load_config(&self) -> TimeoutConfig {
        let loaded = match self.store.get(keys::TIMEOUT_CONFIG).await {
            Ok(Some(raw)) => match serde_json::from_str::<TimeoutConfig>(&raw) {
                Ok(config) => Some(config.clamped()),
                Err(e) => {
                    warn!("Ignoring unparsable auto-logout config: {e}");
                    None
                }
            },
            Ok(None) => Some(TimeoutConfig::default()),
            Err(e) => {
                warn!("Failed to read auto-logout config: {e}");
                None
            }
        };

        let mut rt = self.lock();
        if let Some(config) = loaded {
            rt.config = config;
        }
        rt.config
    }

    /// The single place the deadline changes: cancels whatever is pending and
    /// schedules a fresh expiry `timeout` after `from`.
    fn rearm(self: &Arc<Self>, rt: &mut Runtime, from: i64) {
        rt.cancel_timer();

        if !rt.config.enabled {
            debug!("Auto-logout disabled");
            rt.timer = TimerState::Disarmed;
            return;
        }

        let deadline = from + rt.config.timeout_millis();
        let delay = u64::try_from(deadline - self.clock.now_millis()).unwrap_or(0);
        rt.generation += 1;
        let generation = rt.generation;

        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(delay)).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(generation).await;
            }
        });

        debug!(deadline, "Auto-logout timer armed for {delay}ms");
        rt.timer = TimerState::Armed {
            deadline,
            generation,
            handle,
        };
    }

    /// Timer expiry. Config and foreground state are re-checked here, since
    /// either may have changed during the countdown.
    async fn expire(self: Arc<Self>, generation: u64) {
        if !self.lock().timer.is_current(generation) {
            return;
        }

        let config = self.load_config().await;

        let handler = {
            let mut rt = self.lock();
            if !rt.timer.is_current(generation) {
                return;
            }
            if !config.enabled {
                rt.timer = TimerState::Disarmed;
                return;
            }
            if !rt.foreground {
                info!("Inactivity timeout elapsed in background; deferring logout to resume");
                rt.timer = TimerState::Disarmed;
                return;
            }
            rt.timer = TimerState::Fired;
            self.activity.clear();
            rt.handler.clone()
        };

        if let Some(handler) = handler {
            info!("Auto-logout triggered due to inactivity");
            self.perform_logout(handler).await;
        }
    }

    /// Logs out right away, bypassing the timer. Used on resume when the
    /// deadline has already passed.
    async fn fire_now(&self) {
        let handler = {
            let mut rt = self.lock();
            if matches!(rt.timer, TimerState::Fired) {
                return;
            }
            let Some(handler) = rt.handler.clone() else {
                return;
            };
            rt.cancel_timer();
            rt.timer = TimerState::Fired;
            self.activity.clear();
            handler
        };

        info!("Inactivity timeout elapsed while away; logging out on resume");
        self.perform_logout(handler).await;
    }

    /// Runs after the timer moved to `Fired` and the activity record was
    /// cleared, both under the runtime lock.
    async fn perform_logout(&self, handler: Arc<dyn LogoutHandler>) {
        if let Err(e) = self.store.remove(keys::AUTH_TOKEN).await {
            warn!("Failed to clear auth token during auto-logout: {e}");
        }

        // Run the handler on its own task so a panic stays on that task.
        match tokio::spawn(async move { handler.on_logout().await }).await {
            Ok(Ok(())) => debug!("Logout callback executed successfully"),
            Ok(Err(e)) => warn!("Logout callback failed: {e}"),
            Err(e) if e.is_panic() => warn!("Logout callback panicked"),
            Err(e) => warn!("Logout callback did not complete: {e}"),
        }
    }

    async fn on_lifecycle(self: &Arc<Self>, state: AppLifecycle) {
        if !state.is_foreground() {
            self.lock().foreground = false;
            info!("App moved to {state}; inactivity countdown continues");
            return;
        }

        let active = {
            let mut rt = self.lock();
            rt.foreground = true;
            rt.handler.is_some() && !matches!(rt.timer, TimerState::Fired)
        };
        if !active {
            return;
        }

        let config = self.load_config().await;
        let now = self.clock.now_millis();
        let idle = now - self.activity.last_activity(now).await;
        if config.enabled && idle >= config.timeout_millis() {
            self.fire_now().await;
            return;
        }

        let mut rt = self.lock();
        if rt.handler.is_none() || matches!(rt.timer, TimerState::Fired) {
            return;
        }
        info!("App returned to foreground");
        self.activity.record(now);
        self.rearm(&mut rt, now);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let rt = self.runtime.get_mut().unwrap_or_else(PoisonError::into_inner);
        rt.cancel_timer();
        if let Some(listener) = rt.listener.take() {
            listener.abort();
        }
    }
}

fn spawn_listener(inner: &Arc<Inner>) -> JoinHandle<()> {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let mut transitions = inner.lifecycle.subscribe();
    tokio::spawn(async move {
        while transitions.changed().await.is_ok() {
            let state = *transitions.borrow_and_update();
            let Some(inner) = weak.upgrade() else {
                break;
            };
            inner.on_lifecycle(state).await;
        }
    })
}
