//! Extension trait to ignore mutex poisoning.
//!
//! The mutexes in this crate guard plain bookkeeping (request logs, fake server trees)
//! where a panic on another thread never leaves the value half-updated.

use std::sync::{Mutex, MutexGuard};

pub(crate) trait IgnorePoison<T> {
    /// Locks the mutex, ignoring poison.
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T>;
}

impl<T> IgnorePoison<T> for Mutex<T> {
    fn lock_ignore_poison(&self) -> MutexGuard<'_, T> {
        self.lock().unwrap_or_else(|e| e.into_inner())
    }
}
