/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Epoch-millisecond clocks.
//!
//! Session and cluster agents are poll-driven and take wall-clock time as an
//! input, so every timer decision is reproducible under test with a
//! [`ManualClock`].

use crate::types::Timestamp;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of wall-clock time in Unix epoch milliseconds.
pub trait EpochClock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Returns the current time as a [`Timestamp`].
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now_ms())
    }
}

/// System clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEpochClock;

impl EpochClock for SystemEpochClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually stepped clock for deterministic tests and simulated clusters.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at the given epoch-millisecond value.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self {
            millis: AtomicU64::new(start_ms),
        }
    }

    /// Creates a shared manual clock handle.
    #[must_use]
    pub fn shared(start_ms: u64) -> Arc<Self> {
        Arc::new(Self::new(start_ms))
    }

    /// Advances the clock by `delta_ms` and returns the new value.
    pub fn advance(&self, delta_ms: u64) -> u64 {
        self.millis.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, now_ms: u64) {
        self.millis.store(now_ms, Ordering::SeqCst);
    }
}

impl EpochClock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
