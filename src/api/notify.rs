//! Tick delivery from the acquisition thread to consumers
//!
//! The slot holds only the newest report: publishing never blocks on a slow
//! consumer, and ticks the consumer did not pick up in time are overwritten.

use crate::api::types::TickReport;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Observer run on the acquisition thread for every tick; must return quickly
pub type TickObserver = Box<dyn Fn(&TickReport) + Send>;

/// Latest-value-wins mailbox for [`TickReport`]s
#[derive(Debug, Default)]
pub struct TickSlot {
    latest: Mutex<Option<TickReport>>,
    changed: Condvar,
}

impl TickSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<TickReport>> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the stored report and wake waiting consumers
    pub fn publish(&self, report: TickReport) {
        *self.lock() = Some(report);
        self.changed.notify_all();
    }

    /// Copy of the newest report
    pub fn latest(&self) -> Option<TickReport> {
        self.lock().clone()
    }

    /// Wait until a report newer than `after` is available, or `timeout`
    /// elapses. `after = None` accepts any report. A timeout too large to
    /// represent as a deadline waits indefinitely.
    pub fn wait_newer(&self, after: Option<u64>, timeout: Duration) -> Option<TickReport> {
        let deadline = Instant::now().checked_add(timeout);
        let is_newer = |slot: &Option<TickReport>| match (slot, after) {
            (Some(report), Some(seq)) => report.sequence > seq,
            (Some(_), None) => true,
            (None, _) => false,
        };

        let mut guard = self.lock();
        while !is_newer(&*guard) {
            guard = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    match self.changed.wait_timeout(guard, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => self
                    .changed
                    .wait(guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }
        guard.clone()
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }
}
