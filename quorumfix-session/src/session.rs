/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The FIX session state machine.
//!
//! One [`Session`] is the logical endpoint behind a transport connection.
//! It consumes decoded inbound messages and wall-clock polls, emits outbound
//! admin traffic through the [`SessionProxy`], and hands accepted inbound
//! frames to the [`InboundPublication`].
//!
//! Protocol conditions never propagate as errors: gaps, duplicates, window
//! violations and timeouts all resolve into state transitions and outbound
//! admin messages.

use bytes::Bytes;
use quorumfix_core::clock::EpochClock;
use quorumfix_core::counters::GatewayCounters;
use quorumfix_core::error::{GatewayError, SessionError};
use quorumfix_core::types::{ConnectionId, SeqNum, SessionId, Timestamp};
use quorumfix_store::{MessageStore, SessionRegistry};
use quorumfix_tagvalue::{DecodedMessage, FixEncoder, MsgType, mark_possible_duplicate};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::AuthenticationStrategy;
use crate::config::SessionConfig;
use crate::liveness::LivenessTracker;
use crate::proxy::SessionProxy;
use crate::publication::InboundPublication;
use crate::sequence::{SequenceCheck, SequenceCounters};
use crate::state::{SessionRole, SessionState};

/// Disposition of one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Accepted; `expected_received_seq` advanced and the frame published.
    Accept,
    /// Possible duplicate; processed without advancing sequence numbers.
    Duplicate,
    /// Sequence gap; a ResendRequest episode is in progress.
    GapDetected,
    /// Rejected without ending the session.
    Reject,
    /// The message ended the session.
    Disconnect,
}

/// A FIX session endpoint.
pub struct Session {
    config: SessionConfig,
    role: SessionRole,
    state: SessionState,
    connection_id: ConnectionId,
    session_id: SessionId,
    proxy: SessionProxy,
    sequences: SequenceCounters,
    liveness: LivenessTracker,
    store: Arc<dyn MessageStore>,
    registry: Arc<SessionRegistry>,
    publication: Box<dyn InboundPublication>,
    auth: Arc<dyn AuthenticationStrategy>,
    counters: GatewayCounters,
    clock: Arc<dyn EpochClock>,
    /// Sequence number that triggered the open resend episode.
    awaiting_resend_until: Option<SeqNum>,
    /// Remaining `[next, end]` range of an inbound ResendRequest being served.
    pending_resend: Option<(u64, u64)>,
    connected_at_ms: u64,
    logon_sent_at_ms: Option<u64>,
    logout_sent_at_ms: Option<u64>,
}

impl Session {
    /// Creates a session in the `Connected` state.
    ///
    /// An initiator resolves its stable session id from the registry
    /// immediately; an acceptor resolves it when the peer's Logon arrives.
    ///
    /// # Errors
    /// Returns `GatewayError::Store` if the initiator's id cannot be
    /// allocated.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: SessionRole,
        config: SessionConfig,
        connection_id: ConnectionId,
        proxy: SessionProxy,
        store: Arc<dyn MessageStore>,
        registry: Arc<SessionRegistry>,
        publication: Box<dyn InboundPublication>,
        auth: Arc<dyn AuthenticationStrategy>,
        counters: GatewayCounters,
        clock: Arc<dyn EpochClock>,
    ) -> Result<Self, GatewayError> {
        let session_id = match role {
            SessionRole::Initiator => registry.lookup_or_allocate(&config.session_key())?,
            SessionRole::Acceptor => SessionId::RESERVED,
        };
        let now_ms = clock.now_ms();
        let liveness = LivenessTracker::new(config.heartbeat_interval_ms(), now_ms);

        Ok(Self {
            config,
            role,
            state: SessionState::Connected,
            connection_id,
            session_id,
            proxy,
            sequences: SequenceCounters::new(),
            liveness,
            store,
            registry,
            publication,
            auth,
            counters,
            clock,
            awaiting_resend_until: None,
            pending_resend: None,
            connected_at_ms: now_ms,
            logon_sent_at_ms: None,
            logout_sent_at_ms: None,
        })
    }

    /// Resumes persisted sequence numbers, before any traffic flows.
    pub fn resume_sequences(&mut self, next_sent: SeqNum, expected_received: SeqNum) {
        self.sequences.set_sent(next_sent);
        self.sequences.set_received(expected_received);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Role of this endpoint.
    #[must_use]
    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Stable session id; reserved until an acceptor sees its Logon.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Transport connection id.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Next expected inbound sequence number.
    #[must_use]
    pub fn expected_received_seq(&self) -> SeqNum {
        self.sequences.expected_received()
    }

    /// Next outbound sequence number.
    #[must_use]
    pub fn next_sent_seq(&self) -> SeqNum {
        self.sequences.peek_sent()
    }

    /// Routes a decoded inbound message to the matching handler.
    pub fn dispatch(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        match msg.msg_type {
            MsgType::Logon => self.on_logon(msg, frame),
            MsgType::Logout => self.on_logout(msg, frame),
            MsgType::Heartbeat => self.on_heartbeat(msg, frame),
            MsgType::TestRequest => self.on_test_request(msg, frame),
            MsgType::ResendRequest => self.on_resend_request(msg, frame),
            MsgType::SequenceReset => self.on_sequence_reset(msg, frame),
            MsgType::Reject => self.on_reject(msg, frame),
            MsgType::Business => {
                self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame)
            }
        }
    }

    /// Core inbound discipline applied to every message.
    ///
    /// Checks the SendingTime window, classifies the sequence number,
    /// advances counters, publishes accepted frames and drives the
    /// gap-recovery transitions.
    pub fn on_message(
        &mut self,
        seq: SeqNum,
        sending_time: Option<Timestamp>,
        poss_dup: bool,
        frame: &[u8],
    ) -> MessageOutcome {
        if self.state.is_terminal() {
            return MessageOutcome::Disconnect;
        }
        let now_ms = self.clock.now_ms();

        let Some(sending_time) = sending_time else {
            return self.protocol_violation("SendingTime missing or unparseable");
        };
        if !sending_time.within_window(
            Timestamp::from_millis(now_ms),
            self.config.sending_time_window_ms,
        ) {
            return self.protocol_violation("SendingTime accuracy problem");
        }

        match self.sequences.check(seq) {
            SequenceCheck::InSequence => {
                self.sequences.increment_received();
                self.liveness.on_received(now_ms);
                self.counters.messages_received().increment();

                if !self.publish_inbound(seq, frame) {
                    return MessageOutcome::Disconnect;
                }

                if self.state == SessionState::AwaitingResend
                    && let Some(until) = self.awaiting_resend_until
                    && self.sequences.expected_received() > until
                {
                    self.awaiting_resend_until = None;
                    self.set_state(SessionState::Active);
                }
                MessageOutcome::Accept
            }
            SequenceCheck::TooLow { expected, received } => {
                if poss_dup {
                    self.liveness.on_received(now_ms);
                    self.counters.duplicates().increment();
                    MessageOutcome::Duplicate
                } else {
                    warn!(
                        session_id = self.session_id.value(),
                        expected = expected.value(),
                        received = received.value(),
                        "sequence number lower than expected without PossDupFlag"
                    );
                    self.protocol_violation("MsgSeqNum too low without PossDupFlag")
                }
            }
            SequenceCheck::Gap { expected, received } => {
                self.liveness.on_received(now_ms);
                self.counters.gaps_detected().increment();

                if self.state == SessionState::AwaitingResend {
                    // One request per episode; just widen the catch-up target.
                    self.awaiting_resend_until =
                        Some(self.awaiting_resend_until.map_or(received, |u| u.max(received)));
                    return MessageOutcome::GapDetected;
                }

                debug!(
                    session_id = self.session_id.value(),
                    expected = expected.value(),
                    received = received.value(),
                    "gap detected, requesting resend"
                );
                let seq_out = self.sequences.allocate_sent();
                let sent = self
                    .proxy
                    .resend_request(seq_out, expected, SeqNum::new(0));
                if !self.send_or_disconnect(sent, now_ms) {
                    return MessageOutcome::Disconnect;
                }
                self.counters.resend_requests_sent().increment();
                self.awaiting_resend_until = Some(received);
                if self.state.can_transition_to(SessionState::AwaitingResend) {
                    self.set_state(SessionState::AwaitingResend);
                }
                MessageOutcome::GapDetected
            }
        }
    }

    /// Handles an inbound Logon; entry transitions differ per role.
    pub fn on_logon(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        match (self.role, self.state) {
            (SessionRole::Acceptor, SessionState::Connected) => self.accept_logon(msg, frame),
            (SessionRole::Initiator, SessionState::SentLogon)
                if msg.msg_seq_num == self.sequences.expected_received() =>
            {
                if let Some(hb_secs) = msg.heart_bt_int {
                    self.liveness.set_interval_ms(hb_secs * 1_000);
                }
                self.set_state(SessionState::Active);
                info!(
                    session_id = self.session_id.value(),
                    "initiator session active"
                );
                self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame)
            }
            // A logon reply with an unexpected sequence number is ordinary
            // inbound traffic; a gap starts a resend episode.
            _ => self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame),
        }
    }

    fn accept_logon(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        let now_ms = self.clock.now_ms();

        let Some(sending_time) = msg.sending_time else {
            return self.protocol_violation("SendingTime missing or unparseable");
        };
        if !sending_time.within_window(
            Timestamp::from_millis(now_ms),
            self.config.sending_time_window_ms,
        ) {
            return self.protocol_violation("SendingTime accuracy problem");
        }

        let Some(key) = msg.session_key() else {
            return self.protocol_violation("Logon missing comp ids");
        };

        if !self.auth.authenticate(&key, msg) {
            warn!(%key, "logon rejected by authentication strategy");
            let seq_out = self.sequences.allocate_sent();
            let _ = self.proxy.logout(seq_out, Some("credentials rejected"));
            self.disconnect();
            return MessageOutcome::Disconnect;
        }

        self.session_id = match self.registry.lookup_or_allocate(&key) {
            Ok(id) => id,
            Err(err) => {
                warn!(%key, %err, "session id allocation failed");
                self.disconnect();
                return MessageOutcome::Disconnect;
            }
        };

        let hb_secs = msg
            .heart_bt_int
            .unwrap_or_else(|| self.config.heartbeat_interval_secs());
        self.liveness.set_interval_ms(hb_secs * 1_000);

        if msg.reset_seq_num {
            self.sequences.set_sent(SeqNum::new(1));
            self.sequences.set_received(SeqNum::new(1));
            self.counters.sequence_resets().increment();
        }

        let seq_out = self.sequences.allocate_sent();
        let sent = self.proxy.logon(hb_secs, seq_out);
        if !self.send_or_disconnect(sent, now_ms) {
            return MessageOutcome::Disconnect;
        }
        self.set_state(SessionState::Active);
        info!(
            session_id = self.session_id.value(),
            %key,
            heartbeat_secs = hb_secs,
            "acceptor session active"
        );

        self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame)
    }

    /// Handles an inbound Logout: the confirming half of our own handshake,
    /// or a peer-initiated logout that we confirm and complete.
    pub fn on_logout(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        if self.state == SessionState::AwaitingLogout {
            self.liveness.on_received(self.clock.now_ms());
            self.disconnect();
            return MessageOutcome::Accept;
        }

        let outcome = self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame);
        if outcome != MessageOutcome::Disconnect {
            let seq_out = self.sequences.allocate_sent();
            let _ = self.proxy.logout(seq_out, None);
            self.disconnect();
        }
        outcome
    }

    /// Handles an inbound TestRequest by answering with a Heartbeat quoting
    /// the TestReqID.
    pub fn on_test_request(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        let outcome = self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame);
        if outcome == MessageOutcome::Accept {
            let now_ms = self.clock.now_ms();
            let seq_out = self.sequences.allocate_sent();
            let sent = self.proxy.heartbeat(seq_out, msg.test_req_id.as_deref());
            let _ = self.send_or_disconnect(sent, now_ms);
        }
        outcome
    }

    /// Handles an inbound Heartbeat, clearing an outstanding TestRequest
    /// when the quoted id matches.
    pub fn on_heartbeat(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        let outcome = self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame);
        if matches!(outcome, MessageOutcome::Accept | MessageOutcome::Duplicate) {
            self.liveness
                .on_heartbeat(self.clock.now_ms(), msg.test_req_id.as_deref());
        }
        outcome
    }

    /// Handles an inbound session-level Reject. Logged and counted; the
    /// referenced message is not retransmitted.
    pub fn on_reject(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        let outcome = self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame);
        if outcome == MessageOutcome::Accept {
            warn!(
                session_id = self.session_id.value(),
                ref_seq = msg.ref_seq_num.map_or(0, SeqNum::value),
                text = msg.text.as_deref().unwrap_or(""),
                "session-level reject received"
            );
        }
        outcome
    }

    /// Handles an inbound ResendRequest by replaying stored frames as
    /// possible duplicates and gap-filling the rest.
    ///
    /// Replay is chunked: at most `resend_batch` actions are served now and
    /// the remainder continues across subsequent polls.
    pub fn on_resend_request(&mut self, msg: &DecodedMessage, frame: &[u8]) -> MessageOutcome {
        let outcome = self.on_message(msg.msg_seq_num, msg.sending_time, msg.poss_dup, frame);
        if outcome != MessageOutcome::Accept {
            return outcome;
        }

        let begin = msg.begin_seq_no.unwrap_or(SeqNum::new(1)).value().max(1);
        let highest_sent = self.sequences.peek_sent().value().saturating_sub(1);
        let end = match msg.end_seq_no.map(SeqNum::value) {
            Some(0) | None => highest_sent,
            Some(end) => end.min(highest_sent),
        };

        if begin <= end {
            debug!(
                session_id = self.session_id.value(),
                begin, end, "serving resend request"
            );
            self.pending_resend = Some((begin, end));
            self.serve_resend(self.clock.now_ms());
        }
        outcome
    }

    /// Handles an inbound SequenceReset, in gap-fill or reset mode.
    pub fn on_sequence_reset(&mut self, msg: &DecodedMessage, _frame: &[u8]) -> MessageOutcome {
        if self.state.is_terminal() {
            return MessageOutcome::Disconnect;
        }
        let now_ms = self.clock.now_ms();

        let Some(sending_time) = msg.sending_time else {
            return self.protocol_violation("SendingTime missing or unparseable");
        };
        if !sending_time.within_window(
            Timestamp::from_millis(now_ms),
            self.config.sending_time_window_ms,
        ) {
            return self.protocol_violation("SendingTime accuracy problem");
        }

        let expected = self.sequences.expected_received();

        let Some(new_seq_no) = msg.new_seq_no else {
            let seq_out = self.sequences.allocate_sent();
            let _ = self
                .proxy
                .reject(seq_out, msg.msg_seq_num, Some("NewSeqNo missing"));
            return MessageOutcome::Reject;
        };

        if msg.gap_fill && new_seq_no < expected {
            let seq_out = self.sequences.allocate_sent();
            let _ = self.proxy.reject(
                seq_out,
                msg.msg_seq_num,
                Some("NewSeqNo lower than expected"),
            );
            return MessageOutcome::Reject;
        }

        debug!(
            session_id = self.session_id.value(),
            gap_fill = msg.gap_fill,
            from = expected.value(),
            to = new_seq_no.value(),
            "sequence reset"
        );
        self.sequences.set_received(new_seq_no);
        self.counters.sequence_resets().increment();
        self.liveness.on_received(now_ms);

        if self.state == SessionState::AwaitingResend
            && let Some(until) = self.awaiting_resend_until
            && self.sequences.expected_received() > until
        {
            self.awaiting_resend_until = None;
            self.set_state(SessionState::Active);
        }
        MessageOutcome::Accept
    }

    /// Drives timers and role entry.
    ///
    /// Must be called at least every 100 ms. Returns the number of actions
    /// performed, for idle-strategy backoff.
    pub fn poll(&mut self, now_ms: u64) -> usize {
        let mut actions = 0;

        match self.state {
            SessionState::Connected => match self.role {
                SessionRole::Initiator => {
                    let hb_secs = self.config.heartbeat_interval_secs();
                    let seq_out = self.sequences.allocate_sent();
                    let sent = self.proxy.logon(hb_secs, seq_out);
                    if self.send_or_disconnect(sent, now_ms) {
                        self.logon_sent_at_ms = Some(now_ms);
                        self.set_state(SessionState::SentLogon);
                    }
                    actions += 1;
                }
                SessionRole::Acceptor => {
                    if now_ms.saturating_sub(self.connected_at_ms)
                        > self.config.logon_timeout.as_millis() as u64
                    {
                        info!(connection_id = self.connection_id.value(), "logon timeout");
                        self.disconnect();
                        actions += 1;
                    }
                }
            },
            SessionState::SentLogon => {
                if let Some(sent_at) = self.logon_sent_at_ms
                    && now_ms.saturating_sub(sent_at) > self.config.logon_timeout.as_millis() as u64
                {
                    info!(
                        session_id = self.session_id.value(),
                        "no logon reply, disconnecting"
                    );
                    self.disconnect();
                    actions += 1;
                }
            }
            SessionState::Active | SessionState::AwaitingResend => {
                if self.liveness.is_timed_out(now_ms) {
                    info!(
                        session_id = self.session_id.value(),
                        "test request unanswered, disconnecting"
                    );
                    self.disconnect();
                    return actions + 1;
                }
                if self.liveness.should_send_heartbeat(now_ms) {
                    let seq_out = self.sequences.allocate_sent();
                    let sent = self.proxy.heartbeat(seq_out, None);
                    if self.send_or_disconnect(sent, now_ms) {
                        actions += 1;
                    }
                }
                if self.state != SessionState::Disconnected
                    && self.liveness.should_send_test_request(now_ms)
                {
                    let id = self.liveness.arm_test_request(now_ms);
                    let seq_out = self.sequences.allocate_sent();
                    let sent = self.proxy.test_request(seq_out, &id);
                    if self.send_or_disconnect(sent, now_ms) {
                        actions += 1;
                    }
                }
                actions += self.serve_resend(now_ms);
            }
            SessionState::AwaitingLogout => {
                if let Some(sent_at) = self.logout_sent_at_ms
                    && now_ms.saturating_sub(sent_at)
                        > self.config.logout_timeout.as_millis() as u64
                {
                    info!(
                        session_id = self.session_id.value(),
                        "logout unanswered, disconnecting"
                    );
                    self.disconnect();
                    actions += 1;
                }
            }
            SessionState::Disconnected | SessionState::Disabled => {}
        }

        actions
    }

    /// Starts a logout handshake.
    pub fn start_logout(&mut self) {
        if !self.state.is_established() || self.state == SessionState::AwaitingLogout {
            if !self.state.is_terminal() && self.state != SessionState::AwaitingLogout {
                self.disconnect();
            }
            return;
        }
        let now_ms = self.clock.now_ms();
        let seq_out = self.sequences.allocate_sent();
        let sent = self.proxy.logout(seq_out, None);
        if self.send_or_disconnect(sent, now_ms) {
            self.logout_sent_at_ms = Some(now_ms);
            self.set_state(SessionState::AwaitingLogout);
        }
    }

    /// Tears the session down immediately.
    pub fn disconnect(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.set_state(SessionState::Disconnected);
        self.pending_resend = None;
        self.awaiting_resend_until = None;
        self.counters.disconnects().increment();
        info!(
            session_id = self.session_id.value(),
            connection_id = self.connection_id.value(),
            "session disconnected"
        );
    }

    /// Sends an application message, storing it for resend.
    ///
    /// # Errors
    /// Returns an error when the session is not established or the frame
    /// cannot be sent or stored.
    pub fn send_app_message(
        &mut self,
        msg_type: &str,
        populate: impl FnOnce(&mut FixEncoder<'_>),
    ) -> Result<SeqNum, GatewayError> {
        if !self.state.is_established() {
            return Err(SessionError::InvalidState {
                current: self.state.name(),
                operation: "send application message",
            }
            .into());
        }
        let now_ms = self.clock.now_ms();
        let seq = self.sequences.allocate_sent();
        let frame: Bytes = self.proxy.business(seq, msg_type, populate)?;
        self.store.store(seq, &frame)?;
        self.liveness.on_sent(now_ms);
        Ok(seq)
    }

    fn serve_resend(&mut self, now_ms: u64) -> usize {
        let Some((mut next, end)) = self.pending_resend else {
            return 0;
        };
        let mut actions = 0;

        while next <= end && actions < self.config.resend_batch {
            if let Some(stored) = self.store.get(SeqNum::new(next)) {
                match mark_possible_duplicate(&stored, Timestamp::from_millis(now_ms)) {
                    Ok(resent) => {
                        let sent = self.proxy.resend_raw(&resent);
                        if !self.send_or_disconnect(sent, now_ms) {
                            return actions;
                        }
                    }
                    Err(err) => {
                        warn!(seq = next, %err, "stored frame not replayable, gap filling");
                        let sent = self.proxy.sequence_reset(
                            SeqNum::new(next),
                            SeqNum::new(next + 1),
                            true,
                        );
                        if !self.send_or_disconnect(sent, now_ms) {
                            return actions;
                        }
                    }
                }
                next += 1;
            } else {
                let mut run_end = next;
                while run_end <= end && self.store.get(SeqNum::new(run_end)).is_none() {
                    run_end += 1;
                }
                let sent =
                    self.proxy
                        .sequence_reset(SeqNum::new(next), SeqNum::new(run_end), true);
                if !self.send_or_disconnect(sent, now_ms) {
                    return actions;
                }
                next = run_end;
            }
            actions += 1;
        }

        self.pending_resend = if next > end { None } else { Some((next, end)) };
        actions
    }

    fn publish_inbound(&mut self, seq: SeqNum, frame: &[u8]) -> bool {
        let mut attempts: u32 = 0;
        loop {
            let position = self.publication.try_publish(self.session_id, seq, frame);
            if position >= 0 {
                return true;
            }
            attempts += 1;
            if attempts >= self.config.max_claim_attempts {
                self.counters.failed_publications().increment();
                warn!(
                    session_id = self.session_id.value(),
                    attempts, "inbound publication backpressure, disconnecting"
                );
                let seq_out = self.sequences.allocate_sent();
                let _ = self
                    .proxy
                    .logout(seq_out, Some("inbound publication backpressure"));
                self.disconnect();
                return false;
            }
        }
    }

    fn protocol_violation(&mut self, text: &str) -> MessageOutcome {
        warn!(
            session_id = self.session_id.value(),
            text, "protocol violation"
        );
        let seq_out = self.sequences.allocate_sent();
        let _ = self.proxy.logout(seq_out, Some(text));
        self.disconnect();
        MessageOutcome::Disconnect
    }

    fn send_or_disconnect(
        &mut self,
        result: Result<(), SessionError>,
        now_ms: u64,
    ) -> bool {
        match result {
            Ok(()) => {
                self.liveness.on_sent(now_ms);
                true
            }
            Err(err) => {
                warn!(
                    session_id = self.session_id.value(),
                    %err,
                    "outbound send failed, disconnecting"
                );
                self.disconnect();
                false
            }
        }
    }

    fn set_state(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(
            session_id = self.session_id.value(),
            from = self.state.name(),
            to = next.name(),
            "state transition"
        );
        self.state = next;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("connection_id", &self.connection_id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("next_sent", &self.sequences.peek_sent())
            .field("expected_received", &self.sequences.expected_received())
            .finish_non_exhaustive()
    }
}
