/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Process-wide gateway counters.
//!
//! Counters are an explicitly passed handle, not ambient globals: the engine
//! context creates one [`GatewayCounters`] and hands clones to every
//! component that observes or increments them.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A single monotonic counter cell.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Increments the counter by one.
    #[inline]
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds `n` to the counter.
    #[inline]
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the current value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct Cells {
    messages_received: Counter,
    messages_sent: Counter,
    duplicates: Counter,
    gaps_detected: Counter,
    resend_requests_sent: Counter,
    sequence_resets: Counter,
    disconnects: Counter,
    failed_publications: Counter,
    elections_started: Counter,
    leadership_changes: Counter,
    entries_committed: Counter,
}

/// Shared handle to the gateway's observable counters.
///
/// Cloning is cheap; all clones observe the same cells.
#[derive(Debug, Clone, Default)]
pub struct GatewayCounters {
    cells: Arc<Cells>,
}

impl GatewayCounters {
    /// Creates a fresh set of counters, all zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted inbound FIX messages.
    #[must_use]
    pub fn messages_received(&self) -> &Counter {
        &self.cells.messages_received
    }

    /// Outbound FIX messages handed to the transport.
    #[must_use]
    pub fn messages_sent(&self) -> &Counter {
        &self.cells.messages_sent
    }

    /// Inbound messages discarded as possible duplicates.
    #[must_use]
    pub fn duplicates(&self) -> &Counter {
        &self.cells.duplicates
    }

    /// Sequence gaps detected on inbound traffic.
    #[must_use]
    pub fn gaps_detected(&self) -> &Counter {
        &self.cells.gaps_detected
    }

    /// ResendRequest messages emitted.
    #[must_use]
    pub fn resend_requests_sent(&self) -> &Counter {
        &self.cells.resend_requests_sent
    }

    /// SequenceReset messages processed or emitted.
    #[must_use]
    pub fn sequence_resets(&self) -> &Counter {
        &self.cells.sequence_resets
    }

    /// Sessions moved to the disconnected state.
    #[must_use]
    pub fn disconnects(&self) -> &Counter {
        &self.cells.disconnects
    }

    /// Publications abandoned after exhausting claim attempts.
    #[must_use]
    pub fn failed_publications(&self) -> &Counter {
        &self.cells.failed_publications
    }

    /// Elections started by the local cluster node.
    #[must_use]
    pub fn elections_started(&self) -> &Counter {
        &self.cells.elections_started
    }

    /// Observed leadership transitions.
    #[must_use]
    pub fn leadership_changes(&self) -> &Counter {
        &self.cells.leadership_changes
    }

    /// Entries delivered from the committed log.
    #[must_use]
    pub fn entries_committed(&self) -> &Counter {
        &self.cells.entries_committed
    }
}

impl fmt::Display for GatewayCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx={} tx={} dup={} gaps={} disconnects={} committed={}",
            self.cells.messages_received.get(),
            self.cells.messages_sent.get(),
            self.cells.duplicates.get(),
            self.cells.gaps_detected.get(),
            self.cells.disconnects.get(),
            self.cells.entries_committed.get(),
        )
    }
}
