/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session configuration.

use quorumfix_core::types::{CompId, SessionKey};
use std::time::Duration;

/// Configuration for one FIX session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local SenderCompID (tag 49 on outbound messages).
    pub sender_comp_id: CompId,
    /// Local TargetCompID (tag 56 on outbound messages).
    pub target_comp_id: CompId,
    /// FIX version BeginString (e.g., "FIX.4.4").
    pub begin_string: String,
    /// Heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Maximum tolerated skew between SendingTime and the local clock.
    pub sending_time_window_ms: u64,
    /// How long an initiator waits for the Logon reply.
    pub logon_timeout: Duration,
    /// How long a logout handshake may remain unanswered.
    pub logout_timeout: Duration,
    /// Claim attempts before an inbound publication is abandoned.
    pub max_claim_attempts: u32,
    /// Maximum resend actions served per poll invocation.
    pub resend_batch: usize,
}

impl SessionConfig {
    /// Creates a configuration with required fields and defaults elsewhere.
    ///
    /// # Arguments
    /// * `sender_comp_id` - Local comp id
    /// * `target_comp_id` - Counterparty comp id
    /// * `begin_string` - FIX version string
    #[must_use]
    pub fn new(
        sender_comp_id: CompId,
        target_comp_id: CompId,
        begin_string: impl Into<String>,
    ) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
            begin_string: begin_string.into(),
            heartbeat_interval: Duration::from_secs(30),
            sending_time_window_ms: 120_000,
            logon_timeout: Duration::from_secs(10),
            logout_timeout: Duration::from_secs(10),
            max_claim_attempts: 10,
            resend_batch: 16,
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the SendingTime window.
    #[must_use]
    pub const fn with_sending_time_window_ms(mut self, window_ms: u64) -> Self {
        self.sending_time_window_ms = window_ms;
        self
    }

    /// Sets the logon timeout.
    #[must_use]
    pub fn with_logon_timeout(mut self, timeout: Duration) -> Self {
        self.logon_timeout = timeout;
        self
    }

    /// Sets the logout timeout.
    #[must_use]
    pub fn with_logout_timeout(mut self, timeout: Duration) -> Self {
        self.logout_timeout = timeout;
        self
    }

    /// Sets the claim-attempt bound for inbound publication.
    #[must_use]
    pub const fn with_max_claim_attempts(mut self, attempts: u32) -> Self {
        self.max_claim_attempts = attempts;
        self
    }

    /// Sets the per-poll resend batch size.
    #[must_use]
    pub const fn with_resend_batch(mut self, batch: usize) -> Self {
        self.resend_batch = batch;
        self
    }

    /// Heartbeat interval in whole seconds, as carried on the Logon.
    #[must_use]
    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.heartbeat_interval.as_secs()
    }

    /// Heartbeat interval in milliseconds, as used by the liveness timers.
    #[must_use]
    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.heartbeat_interval.as_millis() as u64
    }

    /// The session key identifying this endpoint in the registry.
    #[must_use]
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.sender_comp_id.clone(), self.target_comp_id.clone())
    }
}
