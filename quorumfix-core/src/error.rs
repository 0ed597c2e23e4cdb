/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the QuorumFix gateway.
//!
//! This module provides a unified error hierarchy using `thiserror`. The
//! session state machine resolves protocol conditions as state transitions
//! rather than propagating them; the variants here cover codec faults,
//! storage faults and the unrecoverable conditions that reach the error
//! handler.

use thiserror::Error;

/// Result type alias using [`GatewayError`] as the error type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Top-level error type for all gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Error during message decoding.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error during message encoding.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Error in session layer operations.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Error in message store or registry operations.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error in the cluster replication layer.
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// I/O error from underlying transport.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable fault. Initiates orderly shutdown via completion
    /// positions; never partially commits.
    #[error("fatal: {reason}")]
    Fatal {
        /// Description of the fault.
        reason: String,
    },
}

/// Errors that occur during FIX message decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Message buffer is incomplete, need more data.
    #[error("incomplete message, need more data")]
    Incomplete,

    /// Invalid BeginString field (tag 8).
    #[error("invalid begin string: expected 8=FIX.x.y")]
    InvalidBeginString,

    /// Missing or invalid BodyLength field (tag 9).
    #[error("invalid body length field (tag 9)")]
    InvalidBodyLength,

    /// Missing MsgType field (tag 35).
    #[error("missing msg type field (tag 35)")]
    MissingMsgType,

    /// Checksum mismatch between calculated and declared values.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum value.
        calculated: u8,
        /// Declared checksum value in message.
        declared: u8,
    },

    /// Missing required field.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Invalid field value for the expected type.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },

    /// Invalid UTF-8 in string field.
    #[error("invalid utf-8 in field: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Message exceeds maximum allowed size.
    #[error("message too large: {size} bytes exceeds maximum {max_size}")]
    MessageTooLarge {
        /// Actual message size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max_size: usize,
    },
}

/// Errors that occur during FIX message encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Field value exceeds maximum length.
    #[error("field value too long for tag {tag}: {length} exceeds max {max_length}")]
    FieldTooLong {
        /// The tag number of the field.
        tag: u32,
        /// Actual length of the value.
        length: usize,
        /// Maximum allowed length.
        max_length: usize,
    },

    /// The frame being rewritten does not contain a required field.
    #[error("frame missing field for rewrite: tag {tag}")]
    MissingRewriteField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Invalid field value for encoding.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },
}

/// Errors in FIX session layer operations.
///
/// Protocol violations and gaps are resolved by the state machine itself;
/// the variants here describe the conditions reported to the error handler
/// or surfaced through counters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Wire traffic violated the session protocol.
    #[error("protocol violation on session {session_id}: {reason}")]
    ProtocolViolation {
        /// The offending session.
        session_id: u64,
        /// Description of the violation.
        reason: String,
    },

    /// Logon credentials were rejected.
    #[error("authentication failure: {reason}")]
    AuthenticationFailure {
        /// Reason for rejection.
        reason: String,
    },

    /// A liveness, logon or logout timer expired.
    #[error("{what} timeout after {elapsed_ms} ms")]
    Timeout {
        /// Which timer expired.
        what: &'static str,
        /// Elapsed time in milliseconds.
        elapsed_ms: u64,
    },

    /// Publication back-pressure persisted past the configured retry bound.
    #[error("backpressure: claim failed after {attempts} attempts")]
    Backpressure {
        /// Attempts performed before giving up.
        attempts: u32,
    },

    /// Session is not in a state that allows the operation.
    #[error("invalid session state: {current} cannot {operation}")]
    InvalidState {
        /// Current session state name.
        current: &'static str,
        /// Attempted operation.
        operation: &'static str,
    },
}

/// Errors in message store and registry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Message not found in store.
    #[error("message not found: seq={seq_num}")]
    NotFound {
        /// Sequence number of the missing message.
        seq_num: u64,
    },

    /// Persistent state failed integrity checks.
    #[error("store corrupted: {reason}")]
    Corrupted {
        /// Description of the corruption.
        reason: String,
    },

    /// The registry has no mapping for the given id.
    #[error("unknown session id: {session_id}")]
    UnknownSessionId {
        /// The unmapped id.
        session_id: u64,
    },

    /// I/O error in persistent store.
    #[error("store i/o error: {0}")]
    Io(String),
}

/// Errors in the cluster replication layer.
///
/// Election losses and replication rejections are internal events; only
/// storage faults and claim failures surface here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// A local append was attempted on a node that is not the leader.
    #[error("not leader (current role: {role})")]
    NotLeader {
        /// Role of the node that refused the append.
        role: &'static str,
    },

    /// The publication could not claim transport space.
    #[error("publication backpressure at position {position}")]
    Backpressure {
        /// Position reported by the failed claim.
        position: i64,
    },

    /// A peer frame failed structural or crc validation.
    #[error("corrupt cluster frame: {reason}")]
    CorruptFrame {
        /// Description of the corruption.
        reason: String,
    },

    /// Persistent consensus state could not be written or read.
    #[error("hard state i/o error: {0}")]
    HardState(String),
}

impl GatewayError {
    /// Returns true if this error must trigger orderly shutdown rather than
    /// session-level recovery.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Fatal { .. }
                | Self::Store(StoreError::Corrupted { .. })
                | Self::Cluster(ClusterError::HardState(_))
        )
    }
}
