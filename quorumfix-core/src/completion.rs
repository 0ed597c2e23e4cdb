/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Completion positions for orderly shutdown.
//!
//! A [`CompletionPosition`] is a one-shot latch carrying the final stream
//! position a component must reach before shutdown completes. The owning
//! agent sets it exactly once when it has drained; observers await it and
//! then close downstream resources in reverse dependency order.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Latch {
    position: Mutex<Option<u64>>,
    signal: Condvar,
}

/// One-shot latch carrying a final stream position.
///
/// Cloning shares the latch; any clone may set or await it.
#[derive(Debug, Clone, Default)]
pub struct CompletionPosition {
    latch: Arc<Latch>,
}

impl CompletionPosition {
    /// Creates a new, unset completion position.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches the final position.
    ///
    /// # Returns
    /// `true` if this call set the latch; `false` if it was already set
    /// (the original value is kept).
    pub fn set(&self, position: u64) -> bool {
        let mut guard = self.latch.position.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(position);
        self.latch.signal.notify_all();
        true
    }

    /// Returns the latched position without blocking, if set.
    #[must_use]
    pub fn poll(&self) -> Option<u64> {
        *self.latch.position.lock()
    }

    /// Blocks until the position is set and returns it.
    #[must_use]
    pub fn await_position(&self) -> u64 {
        let mut guard = self.latch.position.lock();
        loop {
            if let Some(position) = *guard {
                return position;
            }
            self.latch.signal.wait(&mut guard);
        }
    }

    /// Blocks up to `timeout` for the position.
    ///
    /// # Returns
    /// The position, or `None` if the timeout elapsed first.
    #[must_use]
    pub fn await_timeout(&self, timeout: Duration) -> Option<u64> {
        let mut guard = self.latch.position.lock();
        if let Some(position) = *guard {
            return Some(position);
        }
        let _ = self.latch.signal.wait_for(&mut guard, timeout);
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_set_once() {
        let position = CompletionPosition::new();
        assert_eq!(position.poll(), None);
        assert!(position.set(100));
        assert!(!position.set(200));
        assert_eq!(position.poll(), Some(100));
        assert_eq!(position.await_position(), 100);
    }

    #[test]
    fn test_await_across_threads() {
        let position = CompletionPosition::new();
        let setter = position.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set(42);
        });

        assert_eq!(position.await_position(), 42);
        handle.join().unwrap();
    }

    #[test]
    fn test_await_timeout_elapses() {
        let position = CompletionPosition::new();
        assert_eq!(position.await_timeout(Duration::from_millis(10)), None);
        position.set(7);
        assert_eq!(position.await_timeout(Duration::from_millis(10)), Some(7));
    }
}
