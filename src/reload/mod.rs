//! Live-reload rendezvous.
//!
//! A running page long-polls `/spx/{pkg}/_wait`; whoever rebuilt the package
//! hits `/spx/{pkg}/_notify`, which releases exactly one blocked waiter.
//!
//! ```text
//! _wait   ──send()──┐
//!                   ├── zero-capacity channel per package
//! _notify ──try_recv()┘   (handoff only while a waiter is blocked)
//! ```
//!
//! A notify with nobody waiting is dropped, not remembered.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;

use crate::debug;

/// How a `wait` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Notified,
    TimedOut,
}

/// One package's slot. Holding both ends keeps the channel connected.
struct ReloadSlot {
    tx: Sender<()>,
    rx: Receiver<()>,
    waiting: AtomicUsize,
}

impl ReloadSlot {
    fn new() -> Self {
        let (tx, rx) = channel::bounded(0);
        Self {
            tx,
            rx,
            waiting: AtomicUsize::new(0),
        }
    }
}

/// Per-package single-slot rendezvous between waiters and notifiers.
#[derive(Default)]
pub struct ReloadBroker {
    slots: DashMap<String, Arc<ReloadSlot>>,
}

impl ReloadBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `pkg` with this caller already counted as waiting.
    ///
    /// The count is taken under the map's shard lock so [`Self::release`]
    /// never drops a slot someone is about to block on.
    fn join(&self, pkg: &str) -> Arc<ReloadSlot> {
        if let Some(slot) = self.slots.get(pkg) {
            slot.waiting.fetch_add(1, Ordering::SeqCst);
            return Arc::clone(slot.value());
        }
        let slot = self
            .slots
            .entry(pkg.to_string())
            .or_insert_with(|| Arc::new(ReloadSlot::new()));
        slot.waiting.fetch_add(1, Ordering::SeqCst);
        Arc::clone(slot.value())
    }

    /// Uncount a waiter; the last one out removes the slot.
    fn release(&self, pkg: &str, slot: &Arc<ReloadSlot>) {
        if slot.waiting.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.slots.remove_if(pkg, |_, current| {
                Arc::ptr_eq(current, slot) && current.waiting.load(Ordering::SeqCst) == 0
            });
        }
    }

    /// Block until a `notify(pkg)` picks this waiter, or `timeout` elapses.
    ///
    /// `None` waits indefinitely.
    pub fn wait(&self, pkg: &str, timeout: Option<Duration>) -> WaitOutcome {
        let slot = self.join(pkg);
        debug!("reload"; "waiting for {}", pkg);

        let delivered = match timeout {
            Some(timeout) => slot.tx.send_timeout((), timeout).is_ok(),
            None => slot.tx.send(()).is_ok(),
        };

        self.release(pkg, &slot);
        if delivered {
            WaitOutcome::Notified
        } else {
            WaitOutcome::TimedOut
        }
    }

    /// Release one blocked waiter of `pkg`. Returns `false` when none was waiting.
    pub fn notify(&self, pkg: &str) -> bool {
        let Some(slot) = self.slots.get(pkg).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let released = slot.rx.try_recv().is_ok();
        debug!("reload"; "notify {}: {}", pkg, if released { "released" } else { "no waiter" });
        released
    }

    /// Waiters currently blocked on `pkg`.
    #[cfg(test)]
    pub fn waiting(&self, pkg: &str) -> usize {
        self.slots
            .get(pkg)
            .map_or(0, |slot| slot.waiting.load(Ordering::SeqCst))
    }
}
