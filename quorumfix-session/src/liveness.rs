/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Heartbeat and TestRequest liveness tracking.
//!
//! All decisions take wall-clock time as an explicit epoch-millisecond
//! argument so a session driven by `poll(now)` is fully deterministic under
//! test.
//!
//! Protocol:
//! - no outbound traffic for one interval: send a Heartbeat
//! - no inbound traffic for 1.2 intervals: send a TestRequest and arm a
//!   deadline one interval out
//! - deadline passes without a Heartbeat quoting the TestReqID: the peer is
//!   gone, disconnect

use std::fmt::Write as _;

/// Numerator/denominator of the receive grace factor (1.2 intervals).
const RECEIVE_GRACE_NUM: u64 = 12;
const RECEIVE_GRACE_DEN: u64 = 10;

/// Tracks send/receive liveness for one session.
#[derive(Debug)]
pub struct LivenessTracker {
    /// Heartbeat interval in milliseconds.
    interval_ms: u64,
    /// Time any message was last sent.
    last_sent_ms: u64,
    /// Time any message was last received.
    last_received_ms: u64,
    /// Outstanding TestRequest id and its reply deadline.
    pending_test_request: Option<(String, u64)>,
    /// Monotonic id source for generated TestReqIDs.
    next_test_req_id: u64,
}

impl LivenessTracker {
    /// Creates a tracker with the given interval, anchored at `now_ms`.
    #[must_use]
    pub fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            last_sent_ms: now_ms,
            last_received_ms: now_ms,
            pending_test_request: None,
            next_test_req_id: 1,
        }
    }

    /// Returns the heartbeat interval in milliseconds.
    #[inline]
    #[must_use]
    pub const fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Adopts a new interval (the value agreed at logon).
    pub fn set_interval_ms(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
    }

    /// Records outbound traffic.
    #[inline]
    pub fn on_sent(&mut self, now_ms: u64) {
        self.last_sent_ms = now_ms;
    }

    /// Records inbound traffic.
    #[inline]
    pub fn on_received(&mut self, now_ms: u64) {
        self.last_received_ms = now_ms;
    }

    /// Records an inbound Heartbeat. Clears the outstanding TestRequest when
    /// the quoted id matches.
    pub fn on_heartbeat(&mut self, now_ms: u64, test_req_id: Option<&str>) {
        self.last_received_ms = now_ms;
        if let (Some((pending, _)), Some(quoted)) = (&self.pending_test_request, test_req_id)
            && pending == quoted
        {
            self.pending_test_request = None;
        }
    }

    /// True when the outbound side has been silent for a full interval.
    #[must_use]
    pub fn should_send_heartbeat(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_sent_ms) > self.interval_ms
    }

    /// True when the inbound side has been silent past the grace factor and
    /// no TestRequest is outstanding.
    #[must_use]
    pub fn should_send_test_request(&self, now_ms: u64) -> bool {
        if self.pending_test_request.is_some() {
            return false;
        }
        let grace = self.interval_ms * RECEIVE_GRACE_NUM / RECEIVE_GRACE_DEN;
        now_ms.saturating_sub(self.last_received_ms) > grace
    }

    /// Generates the next TestReqID and arms the reply deadline.
    pub fn arm_test_request(&mut self, now_ms: u64) -> String {
        let mut id = String::with_capacity(12);
        let _ = write!(id, "TEST{}", self.next_test_req_id);
        self.next_test_req_id += 1;
        self.pending_test_request = Some((id.clone(), now_ms + self.interval_ms));
        self.last_sent_ms = now_ms;
        id
    }

    /// True when an outstanding TestRequest deadline has passed unanswered.
    #[must_use]
    pub fn is_timed_out(&self, now_ms: u64) -> bool {
        match &self.pending_test_request {
            Some((_, deadline_ms)) => now_ms >= *deadline_ms,
            None => false,
        }
    }

    /// Returns the outstanding TestReqID, if any.
    #[must_use]
    pub fn pending_test_request(&self) -> Option<&str> {
        self.pending_test_request.as_ref().map(|(id, _)| id.as_str())
    }
}
