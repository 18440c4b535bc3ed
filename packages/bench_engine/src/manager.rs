use std::num::NonZero;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, Condvar, Mutex};
use std::time::Duration;

use crate::ERR_POISONED_LOCK;
use crate::counters::{self, UserCounters};

/// What one participant thread contributes to the aggregate when it finishes an attempt.
#[derive(Debug, Default)]
pub(crate) struct ThreadContribution {
    pub(crate) real_time: Duration,
    pub(crate) cpu_time: Duration,
    pub(crate) manual_time: Duration,
    pub(crate) bytes_processed: u64,
    pub(crate) items_processed: u64,
    pub(crate) complexity_n: u64,
    pub(crate) counters: UserCounters,
}

/// The aggregate of all participant threads of one attempt.
///
/// Times are summed over threads. Averaging the wall clock and manual time over the thread
/// count is left to the driver.
#[derive(Debug, Default)]
pub(crate) struct AttemptResult {
    pub(crate) real_time: Duration,
    pub(crate) cpu_time: Duration,
    pub(crate) manual_time: Duration,
    pub(crate) bytes_processed: u64,
    pub(crate) items_processed: u64,
    pub(crate) complexity_n: u64,
    pub(crate) label: Option<String>,
    pub(crate) error_message: Option<String>,
    pub(crate) counters: UserCounters,
}

impl AttemptResult {
    pub(crate) fn has_error(&self) -> bool {
        self.error_message.is_some()
    }
}

/// Coordinates the participant threads of one attempt.
///
/// Every participant passes the barrier exactly twice: once before its timer starts and once
/// after it stops. Results are folded into a single aggregate under a mutex, and the driver
/// can block until every participant has contributed.
#[derive(Debug)]
pub(crate) struct ThreadManager {
    alive_threads: AtomicUsize,

    barrier: Barrier,

    results: Mutex<AttemptResult>,

    // Guards the transition of `alive_threads` to zero so the driver cannot miss the wakeup.
    end_lock: Mutex<()>,
    end_condition: Condvar,
}

impl ThreadManager {
    pub(crate) fn new(threads: NonZero<usize>) -> Self {
        Self {
            alive_threads: AtomicUsize::new(threads.get()),
            barrier: Barrier::new(threads.get()),
            results: Mutex::new(AttemptResult::default()),
            end_lock: Mutex::new(()),
            end_condition: Condvar::new(),
        }
    }

    /// Blocks until every participant has arrived at the current barrier phase.
    pub(crate) fn wait_at_barrier(&self) {
        self.barrier.wait();
    }

    /// Publishes an error message for the attempt unless another thread already did.
    pub(crate) fn publish_error(&self, message: &str) {
        let mut results = self.results.lock().expect(ERR_POISONED_LOCK);

        if results.error_message.is_none() {
            results.error_message = Some(message.to_string());
        }
    }

    pub(crate) fn set_label(&self, label: &str) {
        let mut results = self.results.lock().expect(ERR_POISONED_LOCK);
        results.label = Some(label.to_string());
    }

    /// Folds one thread's contribution into the aggregate and marks that thread as finished.
    ///
    /// # Panics
    ///
    /// Panics if more threads finish than the manager was created for, or if a user counter
    /// was reported with different kinds by different threads. The thread is marked as
    /// finished before the latter panic is raised.
    pub(crate) fn record_and_finish(&self, contribution: &ThreadContribution) {
        let counter_result = {
            let mut results = self.results.lock().expect(ERR_POISONED_LOCK);

            results.real_time = results.real_time.saturating_add(contribution.real_time);
            results.cpu_time = results.cpu_time.saturating_add(contribution.cpu_time);
            results.manual_time = results.manual_time.saturating_add(contribution.manual_time);
            results.bytes_processed = results
                .bytes_processed
                .saturating_add(contribution.bytes_processed);
            results.items_processed = results
                .items_processed
                .saturating_add(contribution.items_processed);
            results.complexity_n = results.complexity_n.max(contribution.complexity_n);

            counters::increment(&mut results.counters, &contribution.counters)
        };

        {
            let _end_guard = self.end_lock.lock().expect(ERR_POISONED_LOCK);

            let previously_alive = self.alive_threads.fetch_sub(1, Ordering::AcqRel);
            assert!(
                previously_alive != 0,
                "more threads finished the attempt than participated in it"
            );

            if previously_alive == 1 {
                self.end_condition.notify_all();
            }
        }

        if let Err(name) = counter_result {
            panic!("counter '{name}' was reported with different kinds by different threads");
        }
    }

    /// Blocks the calling thread until every participant has called
    /// [`record_and_finish()`][Self::record_and_finish].
    pub(crate) fn wait_for_completion(&self) {
        let end_guard = self.end_lock.lock().expect(ERR_POISONED_LOCK);

        drop(
            self.end_condition
                .wait_while(end_guard, |_| self.alive_threads.load(Ordering::Acquire) != 0)
                .expect(ERR_POISONED_LOCK),
        );
    }

    /// Consumes the manager, returning the aggregate.
    pub(crate) fn into_result(self) -> AttemptResult {
        self.results.into_inner().expect(ERR_POISONED_LOCK)
    }
}
