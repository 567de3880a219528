use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A cancellation flag that supports interruptible waits.
///
/// Unlike `thread::sleep()`, waits on this signal return as soon as the
/// signal is triggered, so a pending attach can be abandoned from another
/// thread.
pub struct CancelSignal {
    cancelled: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Trigger the signal, waking all waiting threads.
    pub fn trigger(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    /// Re-arm the signal before a new attach.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Wait for the specified duration or until the signal is triggered.
    ///
    /// Returns `true` if triggered, `false` if the wait completed normally.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }

        let Ok(guard) = self.mutex.lock() else {
            // Mutex poisoned, treat as cancelled
            return true;
        };
        match self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_triggered())
        {
            Ok((_, timeout)) => !timeout.timed_out(),
            Err(_) => true,
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
