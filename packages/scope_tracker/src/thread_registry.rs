//! Process-wide registry of per-thread event logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::buffer::{EventLog, ThreadEvents};

/// Tracks every live thread's event log and holds the events of threads that
/// exited before the aggregator could drain them.
///
/// The registry mutex guards registration, teardown and draining - it is the
/// serialization [`EventLog::drain`] requires - and is never taken on the
/// capture path. Thread identifiers are small sequential integers assigned
/// at registration so they can be persisted.
#[derive(Debug)]
pub(crate) struct ThreadRegistry {
    state: Mutex<RegistryState>,
    next_thread_id: AtomicU64,
}

#[derive(Debug)]
struct RegistryState {
    live: Vec<LiveThread>,
    orphans: Vec<ThreadEvents>,
}

#[derive(Debug)]
struct LiveThread {
    thread_id: u64,
    log: Weak<EventLog>,
}

/// A thread's registration: its identifier and a strong handle to its log.
#[derive(Debug)]
pub(crate) struct RegisteredLog {
    pub(crate) thread_id: u64,
    pub(crate) log: Arc<EventLog>,
}

impl ThreadRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                live: Vec::new(),
                orphans: Vec::new(),
            }),
            next_thread_id: AtomicU64::new(0),
        }
    }

    /// Registers a new thread, returning its identifier and log.
    pub(crate) fn register(&self) -> RegisteredLog {
        let thread_id = self.next_thread_id.fetch_add(1, Ordering::Relaxed);
        let log = Arc::new(EventLog::new());

        self.state.lock().live.push(LiveThread {
            thread_id,
            log: Arc::downgrade(&log),
        });

        RegisteredLog { thread_id, log }
    }

    /// Deregisters an exiting thread.
    ///
    /// Events still in the thread's log move to the orphan holding area and
    /// are merged into the next aggregation, not the current one. The drain
    /// happens under the registry lock so it cannot overlap a concurrent
    /// [`drain_all`](Self::drain_all).
    pub(crate) fn retire(&self, thread_id: u64, log: &Arc<EventLog>) {
        let mut state = self.state.lock();

        let events = log.drain();
        state.live.retain(|entry| entry.thread_id != thread_id);
        if !events.is_empty() {
            state.orphans.push(ThreadEvents { thread_id, events });
        }
    }

    /// Drains every live log and the orphan holding area.
    ///
    /// The registry lock is held for O(threads): each live log hands over its
    /// published segments, then all work happens on the owned vectors. A
    /// scope that closes after its log was read lands in the next drain.
    pub(crate) fn drain_all(&self) -> Vec<ThreadEvents> {
        let mut state = self.state.lock();

        let mut drained: Vec<ThreadEvents> = state.orphans.drain(..).collect();

        // Logs of threads that exited without retiring have no events to
        // contribute; drop the dead references while we are here.
        state.live.retain(|entry| entry.log.strong_count() > 0);

        for entry in &state.live {
            let Some(log) = entry.log.upgrade() else {
                continue;
            };
            let events = log.drain();
            if !events.is_empty() {
                drained.push(ThreadEvents {
                    thread_id: entry.thread_id,
                    events,
                });
            }
        }

        drained
    }
}
