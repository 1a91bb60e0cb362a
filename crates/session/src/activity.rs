//! Last-activity bookkeeping.
//!
//! The most recent timestamp is always available in memory. Persistence goes
//! through a single-slot queue drained by one writer task: a newer record
//! replaces an unwritten older one, and writes are applied in order, so a
//! slow write can never resurrect a stale timestamp.

use crate::keys;
use crate::store::KeyValueStore;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Set(i64),
    Clear,
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    seq: u64,
    op: Option<WriteOp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Known {
    /// Nothing recorded by this process yet; the store may hold an older value.
    Unknown,
    At(i64),
    Cleared,
}

pub struct ActivityLog {
    store: Arc<dyn KeyValueStore>,
    known: Mutex<Known>,
    pending: watch::Sender<PendingWrite>,
    completed: watch::Receiver<u64>,
}

impl ActivityLog {
    /// Creates the log and spawns its writer task on the current tokio runtime.
    ///
    /// The writer exits once the log is dropped.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (pending, pending_rx) = watch::channel(PendingWrite { seq: 0, op: None });
        let (completed_tx, completed) = watch::channel(0);

        tokio::spawn(run_writer(Arc::clone(&store), pending_rx, completed_tx));

        Self {
            store,
            known: Mutex::new(Known::Unknown),
            pending,
            completed,
        }
    }

    /// Records `timestamp` and queues it for persistence. Never blocks on I/O.
    pub fn record(&self, timestamp: i64) {
        *self.known.lock().unwrap_or_else(PoisonError::into_inner) = Known::At(timestamp);
        self.enqueue(WriteOp::Set(timestamp));
    }

    /// Forgets the last activity and queues removal of the persisted record.
    pub fn clear(&self) {
        *self.known.lock().unwrap_or_else(PoisonError::into_inner) = Known::Cleared;
        self.enqueue(WriteOp::Clear);
    }

    /// Timestamp recorded by this process, if any.
    #[cfg(test)]
    pub fn latest(&self) -> Option<i64> {
        match *self.known.lock().unwrap_or_else(PoisonError::into_inner) {
            Known::At(ts) => Some(ts),
            Known::Unknown | Known::Cleared => None,
        }
    }

    /// Last activity in epoch millis, or `now` when none is known.
    ///
    /// Falls back to the persisted record only if this process has not
    /// recorded or cleared anything itself.
    pub async fn last_activity(&self, now: i64) -> i64 {
        let known = *self.known.lock().unwrap_or_else(PoisonError::into_inner);
        match known {
            Known::At(ts) => ts,
            Known::Cleared => now,
            Known::Unknown => match self.store.get(keys::LAST_ACTIVITY).await {
                Ok(Some(raw)) => raw.trim().parse().unwrap_or_else(|_| {
                    warn!("Ignoring unparsable last activity record: {raw:?}");
                    now
                }),
                Ok(None) => now,
                Err(e) => {
                    warn!("Failed to read last activity: {e}");
                    now
                }
            },
        }
    }

    /// Waits until everything queued so far has been written (or has failed).
    pub async fn flush(&self) {
        let target = self.pending.borrow().seq;
        let mut completed = self.completed.clone();
        // An error means the writer is gone; nothing left to wait for.
        let _ = completed.wait_for(|seq| *seq >= target).await;
    }

    fn enqueue(&self, op: WriteOp) {
        self.pending.send_modify(|pending| {
            pending.seq += 1;
            pending.op = Some(op);
        });
    }
}

async fn run_writer(
    store: Arc<dyn KeyValueStore>,
    mut pending: watch::Receiver<PendingWrite>,
    completed: watch::Sender<u64>,
) {
    while pending.changed().await.is_ok() {
        let write = *pending.borrow_and_update();
        match write.op {
            Some(WriteOp::Set(ts)) => {
                if let Err(e) = store.set(keys::LAST_ACTIVITY, &ts.to_string()).await {
                    warn!("Failed to persist last activity: {e}");
                }
            }
            Some(WriteOp::Clear) => {
                if let Err(e) = store.remove(keys::LAST_ACTIVITY).await {
                    warn!("Failed to clear last activity: {e}");
                }
            }
            None => {}
        }
        completed.send_replace(write.seq);
    }
}
