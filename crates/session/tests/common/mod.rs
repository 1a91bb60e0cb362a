#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
use async_trait::async_trait;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, Instant};
use wallet_session::{
    BiometricKind, BiometricSensor, Clock, KeyValueStore, LifecycleController, LifecycleSignal, LogoutHandler,
    MemoryStore, PromptOptions, PromptOutcome, SecretStore, SessionTimeoutMonitor,
};

/// Wall clock that follows tokio's (pausable) time.
pub struct TestClock {
    base: i64,
    start: Instant,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            base: 1_700_000_000_000,
            start: Instant::now(),
        }
    }

    /// Epoch millis `offset` after the clock was created.
    pub fn base_plus(&self, offset: i64) -> i64 {
        self.base + offset
    }

    /// Millis since the clock was created.
    pub fn elapsed(&self) -> i64 {
        i64::try_from(self.start.elapsed().as_millis()).unwrap()
    }
}

impl Clock for TestClock {
    fn now_millis(&self) -> i64 {
        self.base + self.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerBehavior {
    Succeed,
    Fail,
    Panic,
}

pub struct CountingHandler {
    calls: AtomicUsize,
    behavior: HandlerBehavior,
}

impl CountingHandler {
    pub fn new() -> Arc<Self> {
        Self::with_behavior(HandlerBehavior::Succeed)
    }

    pub fn with_behavior(behavior: HandlerBehavior) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogoutHandler for CountingHandler {
    async fn on_logout(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            HandlerBehavior::Succeed => Ok(()),
            HandlerBehavior::Fail => Err("navigation unavailable".into()),
            HandlerBehavior::Panic => panic!("logout handler blew up"),
        }
    }
}

/// Memory store whose reads and writes can be made to fail per key.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    slow_removes: Mutex<HashMap<String, Duration>>,
    fail_all: AtomicBool,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_reads_of(&self, key: &str) {
        self.failing_reads.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_writes_of(&self, key: &str) {
        self.failing_writes.lock().unwrap().insert(key.to_string());
    }

    /// Makes every removal of `key` take `delay` before it succeeds.
    pub fn delay_removes_of(&self, key: &str, delay: Duration) {
        self.slow_removes.lock().unwrap().insert(key.to_string(), delay);
    }

    pub fn fail_everything(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_all.store(false, Ordering::SeqCst);
        self.failing_reads.lock().unwrap().clear();
        self.failing_writes.lock().unwrap().clear();
    }

    /// Direct read that bypasses fault injection.
    pub async fn peek(&self, key: &str) -> Option<String> {
        KeyValueStore::get(&self.inner, key).await.unwrap()
    }

    /// Direct write that bypasses fault injection.
    pub async fn poke(&self, key: &str, value: &str) {
        KeyValueStore::set(&self.inner, key, value).await.unwrap();
    }

    fn check_read(&self, key: &str) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) || self.failing_reads.lock().unwrap().contains(key) {
            return Err(eyre!("storage unavailable (read {key})"));
        }
        Ok(())
    }

    fn check_write(&self, key: &str) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) || self.failing_writes.lock().unwrap().contains(key) {
            return Err(eyre!("storage unavailable (write {key})"));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_read(key)?;
        KeyValueStore::get(&self.inner, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_write(key)?;
        KeyValueStore::set(&self.inner, key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_write(key)?;
        let delay = self.slow_removes.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        KeyValueStore::remove(&self.inner, key).await
    }
}

#[async_trait]
impl SecretStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        KeyValueStore::get(self, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        KeyValueStore::set(self, key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        KeyValueStore::remove(self, key).await
    }
}

/// Sensor with a configurable answer that counts prompts.
pub struct ScriptedSensor {
    hardware: bool,
    enrolled: bool,
    outcome: Mutex<Option<PromptOutcome>>,
    prompts: AtomicUsize,
    messages: Mutex<Vec<String>>,
}

impl ScriptedSensor {
    /// Capable, enrolled sensor answering every prompt with `outcome`.
    pub fn answering(outcome: PromptOutcome) -> Arc<Self> {
        Arc::new(Self {
            hardware: true,
            enrolled: true,
            outcome: Mutex::new(Some(outcome)),
            prompts: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        })
    }

    /// Capable, enrolled sensor whose prompt returns an error.
    pub fn erroring() -> Arc<Self> {
        Arc::new(Self {
            hardware: true,
            enrolled: true,
            outcome: Mutex::new(None),
            prompts: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn with_capability(hardware: bool, enrolled: bool) -> Arc<Self> {
        Arc::new(Self {
            hardware,
            enrolled,
            outcome: Mutex::new(Some(PromptOutcome::Success)),
            prompts: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        })
    }

    pub fn answer(&self, outcome: PromptOutcome) {
        *self.outcome.lock().unwrap() = Some(outcome);
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl BiometricSensor for ScriptedSensor {
    async fn has_hardware(&self) -> Result<bool> {
        Ok(self.hardware)
    }

    async fn is_enrolled(&self) -> Result<bool> {
        Ok(self.enrolled)
    }

    async fn supported_kinds(&self) -> Result<Vec<BiometricKind>> {
        if self.hardware {
            Ok(vec![BiometricKind::Fingerprint, BiometricKind::FacialRecognition])
        } else {
            Ok(Vec::new())
        }
    }

    async fn prompt(&self, options: &PromptOptions) -> Result<PromptOutcome> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.messages.lock().unwrap().push(options.message.clone());
        self.outcome
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| eyre!("biometric hardware error"))
    }
}

pub struct Harness {
    pub monitor: SessionTimeoutMonitor,
    pub lifecycle: LifecycleController,
    pub clock: Arc<TestClock>,
    pub store: Arc<FaultyStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(FaultyStore::new())
    }

    pub fn with_store(store: Arc<FaultyStore>) -> Self {
        let (signal, lifecycle) = LifecycleSignal::channel();
        let clock = Arc::new(TestClock::new());
        let monitor = SessionTimeoutMonitor::new(store.clone(), signal, clock.clone());
        Self {
            monitor,
            lifecycle,
            clock,
            store,
        }
    }
}

/// Lets every ready task run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
