//! In-flight work deduplication.
//!
//! The first caller for a key becomes the leader and runs the work; callers
//! that arrive while it runs park on a channel and receive a clone of the
//! leader's result. Nothing is remembered once the leader finishes.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Keyed table of running work and the callers waiting on it.
pub struct InFlight<T> {
    pending: DashMap<String, Vec<Sender<T>>>,
}

impl<T: Clone> InFlight<T> {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Run `work` for `key` unless it is already running, then share its result.
    ///
    /// `on_panic` produces the result handed to everyone when the leader's
    /// work panics (or the leader vanishes without answering).
    pub fn run<W, P>(&self, key: &str, work: W, on_panic: P) -> T
    where
        W: FnOnce() -> T,
        P: FnOnce() -> T,
    {
        if let Some(rx) = self.join_or_lead(key) {
            return rx.recv().unwrap_or_else(|_| on_panic());
        }

        let result = catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|_| on_panic());

        let waiters = self
            .pending
            .remove(key)
            .map(|(_, w)| w)
            .unwrap_or_default();
        Self::broadcast(&waiters, &result);
        result
    }

    /// Number of keys with work currently running.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// `Some(receiver)` when joining existing work, `None` when now leading.
    ///
    /// The shard guard is released before the caller blocks on the receiver.
    fn join_or_lead(&self, key: &str) -> Option<Receiver<T>> {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut e) => {
                let (tx, rx) = channel::bounded(1);
                e.get_mut().push(tx);
                Some(rx)
            }
            Entry::Vacant(e) => {
                e.insert(Vec::new());
                None
            }
        }
    }

    fn broadcast(waiters: &[Sender<T>], result: &T) {
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
    }
}

impl<T: Clone> Default for InFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_single_caller_runs_work() {
        let inflight = InFlight::new();
        assert_eq!(inflight.run("a", || 7, || 0), 7);
        assert!(inflight.is_empty());
    }

    #[test]
    fn test_concurrent_callers_share_one_run() {
        let inflight = Arc::new(InFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let inflight = Arc::clone(&inflight);
                let runs = Arc::clone(&runs);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    inflight.run(
                        "github.com/sample/Game",
                        || {
                            runs.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(300));
                            "built".to_string()
                        },
                        || "panicked".to_string(),
                    )
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "built");
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }

    #[test]
    fn test_distinct_keys_run_independently() {
        let inflight = InFlight::new();
        let runs = AtomicUsize::new(0);
        for key in ["a", "b", "c"] {
            inflight.run(
                key,
                || runs.fetch_add(1, Ordering::SeqCst),
                || usize::MAX,
            );
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panic_becomes_result_and_clears_entry() {
        let inflight: InFlight<Result<u32, String>> = InFlight::new();
        let result = inflight.run(
            "boom",
            || panic!("compiler exploded"),
            || Err("panicked".to_string()),
        );
        assert_eq!(result, Err("panicked".to_string()));
        assert!(inflight.is_empty());

        // The key is usable again afterwards
        assert_eq!(inflight.run("boom", || Ok(1), || Err(String::new())), Ok(1));
    }
}
