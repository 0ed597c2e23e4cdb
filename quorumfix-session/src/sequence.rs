/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sequence number discipline.
//!
//! Both counters are 1-origin and monotonic. The sent counter is read by
//! the transport writer while the receive path advances the expected
//! counter, hence atomics rather than plain fields.

use quorumfix_core::types::SeqNum;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-session sequence counters.
#[derive(Debug)]
pub struct SequenceCounters {
    /// Next sequence number to stamp on an outbound message.
    next_sent: AtomicU64,
    /// Next sequence number expected on an inbound message.
    expected_received: AtomicU64,
}

impl SequenceCounters {
    /// Creates counters starting at 1/1.
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial(SeqNum::new(1), SeqNum::new(1))
    }

    /// Creates counters resuming from persisted values.
    #[must_use]
    pub fn with_initial(next_sent: SeqNum, expected_received: SeqNum) -> Self {
        Self {
            next_sent: AtomicU64::new(next_sent.value()),
            expected_received: AtomicU64::new(expected_received.value()),
        }
    }

    /// Returns the next outbound sequence number without allocating it.
    #[inline]
    #[must_use]
    pub fn peek_sent(&self) -> SeqNum {
        SeqNum::new(self.next_sent.load(Ordering::SeqCst))
    }

    /// Allocates the next outbound sequence number.
    ///
    /// Returns the pre-increment value: the number the outgoing message
    /// must carry.
    #[inline]
    pub fn allocate_sent(&self) -> SeqNum {
        SeqNum::new(self.next_sent.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the next expected inbound sequence number.
    #[inline]
    #[must_use]
    pub fn expected_received(&self) -> SeqNum {
        SeqNum::new(self.expected_received.load(Ordering::SeqCst))
    }

    /// Advances the expected inbound sequence number by one.
    #[inline]
    pub fn increment_received(&self) {
        self.expected_received.fetch_add(1, Ordering::SeqCst);
    }

    /// Forces the next outbound sequence number.
    #[inline]
    pub fn set_sent(&self, seq: SeqNum) {
        self.next_sent.store(seq.value(), Ordering::SeqCst);
    }

    /// Forces the next expected inbound sequence number.
    #[inline]
    pub fn set_received(&self, seq: SeqNum) {
        self.expected_received.store(seq.value(), Ordering::SeqCst);
    }

    /// Classifies an inbound sequence number against the expected one.
    #[must_use]
    pub fn check(&self, received: SeqNum) -> SequenceCheck {
        let expected = self.expected_received();
        if received == expected {
            SequenceCheck::InSequence
        } else if received < expected {
            SequenceCheck::TooLow { expected, received }
        } else {
            SequenceCheck::Gap { expected, received }
        }
    }
}

impl Default for SequenceCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of classifying an inbound sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Exactly the expected number.
    InSequence,
    /// Below expected: a possible duplicate or a reset violation.
    TooLow {
        /// Expected sequence number.
        expected: SeqNum,
        /// Received sequence number.
        received: SeqNum,
    },
    /// Above expected: messages were missed.
    Gap {
        /// Expected sequence number (the first missing one).
        expected: SeqNum,
        /// Received sequence number.
        received: SeqNum,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_one() {
        let counters = SequenceCounters::new();
        assert_eq!(counters.peek_sent(), SeqNum::new(1));
        assert_eq!(counters.expected_received(), SeqNum::new(1));
    }

    #[test]
    fn test_allocate_returns_pre_increment() {
        let counters = SequenceCounters::new();
        assert_eq!(counters.allocate_sent(), SeqNum::new(1));
        assert_eq!(counters.allocate_sent(), SeqNum::new(2));
        assert_eq!(counters.peek_sent(), SeqNum::new(3));
    }

    #[test]
    fn test_check_classification() {
        let counters = SequenceCounters::with_initial(SeqNum::new(1), SeqNum::new(5));

        assert_eq!(counters.check(SeqNum::new(5)), SequenceCheck::InSequence);
        assert_eq!(
            counters.check(SeqNum::new(3)),
            SequenceCheck::TooLow {
                expected: SeqNum::new(5),
                received: SeqNum::new(3),
            }
        );
        assert_eq!(
            counters.check(SeqNum::new(9)),
            SequenceCheck::Gap {
                expected: SeqNum::new(5),
                received: SeqNum::new(9),
            }
        );
    }

    #[test]
    fn test_forced_resets() {
        let counters = SequenceCounters::new();
        counters.set_received(SeqNum::new(10));
        counters.set_sent(SeqNum::new(20));
        assert_eq!(counters.expected_received(), SeqNum::new(10));
        assert_eq!(counters.peek_sent(), SeqNum::new(20));

        counters.increment_received();
        assert_eq!(counters.expected_received(), SeqNum::new(11));
    }
}
