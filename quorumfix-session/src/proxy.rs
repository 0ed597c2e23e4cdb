/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound admin message encoding.
//!
//! The [`SessionProxy`] is the single writer for a session's outbound
//! traffic. Every message carries the standard header (MsgType, comp ids,
//! MsgSeqNum, SendingTime); sequence numbers are allocated by the caller so
//! the proxy stays a pure encoder in front of the [`OutboundSink`].

use bytes::Bytes;
use quorumfix_core::clock::EpochClock;
use quorumfix_core::counters::GatewayCounters;
use quorumfix_core::error::SessionError;
use quorumfix_core::types::{CompId, SeqNum};
use quorumfix_tagvalue::{FixEncoder, MsgType, tags};
use std::sync::Arc;

use crate::config::SessionConfig;

/// Destination for encoded outbound frames.
pub trait OutboundSink: Send {
    /// Hands one complete frame to the transport.
    ///
    /// # Errors
    /// Returns `SessionError` when the transport cannot take the frame; the
    /// session resolves this by disconnecting.
    fn send(&mut self, frame: &[u8]) -> Result<(), SessionError>;
}

/// Sink collecting frames in memory, for tests and tooling.
#[derive(Debug, Clone, Default)]
pub struct CapturingSink {
    frames: Arc<parking_lot::Mutex<Vec<Bytes>>>,
}

impl CapturingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the captured frames.
    #[must_use]
    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    /// Number of captured frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutboundSink for CapturingSink {
    fn send(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        self.frames.lock().push(Bytes::copy_from_slice(frame));
        Ok(())
    }
}

/// Encoder of a session's outbound FIX messages.
pub struct SessionProxy {
    begin_string: String,
    sender_comp_id: CompId,
    target_comp_id: CompId,
    clock: Arc<dyn EpochClock>,
    counters: GatewayCounters,
    sink: Box<dyn OutboundSink>,
}

impl SessionProxy {
    /// Creates a proxy for one session.
    #[must_use]
    pub fn new(
        config: &SessionConfig,
        clock: Arc<dyn EpochClock>,
        counters: GatewayCounters,
        sink: Box<dyn OutboundSink>,
    ) -> Self {
        Self {
            begin_string: config.begin_string.clone(),
            sender_comp_id: config.sender_comp_id.clone(),
            target_comp_id: config.target_comp_id.clone(),
            clock,
            counters,
            sink,
        }
    }

    fn header(&self, msg_type: &[u8], seq: SeqNum) -> FixEncoder<'_> {
        let mut encoder = FixEncoder::new(&self.begin_string);
        encoder.put_raw(tags::MSG_TYPE, msg_type);
        encoder.put_str(tags::SENDER_COMP_ID, self.sender_comp_id.as_str());
        encoder.put_str(tags::TARGET_COMP_ID, self.target_comp_id.as_str());
        encoder.put_uint(tags::MSG_SEQ_NUM, seq.value());
        encoder.put_timestamp(tags::SENDING_TIME, self.clock.now());
        encoder
    }

    fn dispatch(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        self.sink.send(frame)?;
        self.counters.messages_sent().increment();
        Ok(())
    }

    /// Sends a Logon.
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn logon(&mut self, heartbeat_secs: u64, seq: SeqNum) -> Result<(), SessionError> {
        let mut encoder = self.header(MsgType::Logon.as_bytes(), seq);
        encoder.put_uint(tags::ENCRYPT_METHOD, 0);
        encoder.put_uint(tags::HEART_BT_INT, heartbeat_secs);
        let frame = encoder.finish();
        self.dispatch(&frame)
    }

    /// Sends a Logout, optionally with explanatory text.
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn logout(&mut self, seq: SeqNum, text: Option<&str>) -> Result<(), SessionError> {
        let mut encoder = self.header(MsgType::Logout.as_bytes(), seq);
        if let Some(text) = text {
            encoder.put_str(tags::TEXT, text);
        }
        let frame = encoder.finish();
        self.dispatch(&frame)
    }

    /// Sends a Heartbeat, quoting a TestReqID when answering a TestRequest.
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn heartbeat(&mut self, seq: SeqNum, test_req_id: Option<&str>) -> Result<(), SessionError> {
        let mut encoder = self.header(MsgType::Heartbeat.as_bytes(), seq);
        if let Some(id) = test_req_id {
            encoder.put_str(tags::TEST_REQ_ID, id);
        }
        let frame = encoder.finish();
        self.dispatch(&frame)
    }

    /// Sends a TestRequest.
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn test_request(&mut self, seq: SeqNum, test_req_id: &str) -> Result<(), SessionError> {
        let mut encoder = self.header(MsgType::TestRequest.as_bytes(), seq);
        encoder.put_str(tags::TEST_REQ_ID, test_req_id);
        let frame = encoder.finish();
        self.dispatch(&frame)
    }

    /// Sends a ResendRequest for `[begin, end]`, where an `end` of 0 means
    /// "everything from begin".
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn resend_request(
        &mut self,
        seq: SeqNum,
        begin: SeqNum,
        end: SeqNum,
    ) -> Result<(), SessionError> {
        let mut encoder = self.header(MsgType::ResendRequest.as_bytes(), seq);
        encoder.put_uint(tags::BEGIN_SEQ_NO, begin.value());
        encoder.put_uint(tags::END_SEQ_NO, end.value());
        let frame = encoder.finish();
        self.dispatch(&frame)
    }

    /// Sends a session-level Reject referencing the offending message.
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn reject(
        &mut self,
        seq: SeqNum,
        ref_seq: SeqNum,
        text: Option<&str>,
    ) -> Result<(), SessionError> {
        let mut encoder = self.header(MsgType::Reject.as_bytes(), seq);
        encoder.put_uint(tags::REF_SEQ_NUM, ref_seq.value());
        if let Some(text) = text {
            encoder.put_str(tags::TEXT, text);
        }
        let frame = encoder.finish();
        self.dispatch(&frame)
    }

    /// Sends a SequenceReset.
    ///
    /// Gap-fill resets carry `PossDupFlag=Y` and stand in for a run of
    /// resent admin messages; reset-mode frames forcibly move the receiver.
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn sequence_reset(
        &mut self,
        seq: SeqNum,
        new_seq_no: SeqNum,
        gap_fill: bool,
    ) -> Result<(), SessionError> {
        let mut encoder = self.header(MsgType::SequenceReset.as_bytes(), seq);
        if gap_fill {
            encoder.put_bool(tags::POSS_DUP_FLAG, true);
        }
        encoder.put_bool(tags::GAP_FILL_FLAG, gap_fill);
        encoder.put_uint(tags::NEW_SEQ_NO, new_seq_no.value());
        let frame = encoder.finish();
        self.dispatch(&frame)
    }

    /// Sends an application message and returns the encoded frame so the
    /// caller can store it for resend.
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn business(
        &mut self,
        seq: SeqNum,
        msg_type: &str,
        populate: impl FnOnce(&mut FixEncoder<'_>),
    ) -> Result<Bytes, SessionError> {
        let mut encoder = self.header(msg_type.as_bytes(), seq);
        populate(&mut encoder);
        let frame = encoder.finish().freeze();
        self.dispatch(&frame)?;
        Ok(frame)
    }

    /// Sends an already encoded frame (a possible-duplicate replay).
    ///
    /// # Errors
    /// Returns `SessionError` if the sink refuses the frame.
    pub fn resend_raw(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        self.dispatch(frame)
    }
}

impl std::fmt::Debug for SessionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProxy")
            .field("begin_string", &self.begin_string)
            .field("sender_comp_id", &self.sender_comp_id)
            .field("target_comp_id", &self.target_comp_id)
            .finish_non_exhaustive()
    }
}
