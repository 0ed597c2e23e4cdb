/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core identifier and timestamp types for the gateway.
//!
//! This module provides the fundamental types shared by the session and
//! cluster layers:
//! - [`SeqNum`]: FIX message sequence number, 1-origin
//! - [`SessionId`]: stable 64-bit logical session identifier
//! - [`ConnectionId`]: transport-level connection identifier
//! - [`Term`] / [`LogIndex`]: replication epoch and log position
//! - [`CompId`] / [`SessionKey`]: FIX endpoint identity
//! - [`Timestamp`]: FIX-formatted wall-clock timestamp

use arrayvec::ArrayString;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// FIX message sequence number.
///
/// Sequence numbers are unsigned 64-bit integers that identify messages
/// within one direction of a FIX session. They start at 1 and increment
/// for each message sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SeqNum(u64);

impl SeqNum {
    /// Creates a new sequence number.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw sequence number value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Checks if this sequence number is valid (>= 1).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 >= 1
    }
}

impl Default for SeqNum {
    fn default() -> Self {
        Self(1)
    }
}

impl From<u64> for SeqNum {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SeqNum> for u64 {
    fn from(seq: SeqNum) -> Self {
        seq.0
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable logical session identifier.
///
/// Allocated once per [`SessionKey`] by the session registry and reused
/// across transport reconnects, so a returning counterparty resumes with
/// the correct sequence numbers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Reserved id tagging cluster control traffic. Never allocated by the
    /// session registry.
    pub const RESERVED: Self = Self(0);

    /// Creates a new session id.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns true if this is the reserved control-traffic id.
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-level connection identifier, unique per live connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new connection id.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replication election epoch. At most one leader exists per term.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Term(u64);

impl Term {
    /// Creates a new term.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the next term.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position in the replicated log. Dense and monotonic; index 0 means
/// "before the first entry".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct LogIndex(u64);

impl LogIndex {
    /// Creates a new log index.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the next index.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Component identifier for FIX sessions.
///
/// Used for SenderCompID (tag 49), TargetCompID (tag 56) and the sub/location
/// qualifiers. Maximum length is 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompId from a string slice.
    ///
    /// # Returns
    /// `Some(CompId)` if the string fits within the maximum length, `None` otherwise.
    #[must_use]
    pub fn new(s: &str) -> Option<Self> {
        ArrayString::from(s).ok().map(Self)
    }

    /// Returns the CompId as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the length of the CompId in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the CompId is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for CompId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompId {
    type Err = arrayvec::CapacityError<()>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArrayString::try_from(s)
            .map(Self)
            .map_err(|_| arrayvec::CapacityError::new(()))
    }
}

/// Composite identity of a FIX session.
///
/// A session is identified by the `(sender, target)` comp-id pair plus the
/// optional sub and location qualifiers. Keys are hashed and compared by
/// value and map to a stable [`SessionId`] through the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    /// SenderCompID (tag 49) as seen by the local endpoint.
    pub sender_comp_id: CompId,
    /// TargetCompID (tag 56) as seen by the local endpoint.
    pub target_comp_id: CompId,
    /// Optional SenderSubID (tag 50).
    pub sender_sub_id: Option<CompId>,
    /// Optional TargetSubID (tag 57).
    pub target_sub_id: Option<CompId>,
    /// Optional SenderLocationID (tag 142).
    pub location_id: Option<CompId>,
}

impl SessionKey {
    /// Creates a key from the mandatory comp-id pair.
    #[must_use]
    pub fn new(sender_comp_id: CompId, target_comp_id: CompId) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
            sender_sub_id: None,
            target_sub_id: None,
            location_id: None,
        }
    }

    /// Sets the sender sub id qualifier.
    #[must_use]
    pub fn with_sender_sub_id(mut self, id: CompId) -> Self {
        self.sender_sub_id = Some(id);
        self
    }

    /// Sets the target sub id qualifier.
    #[must_use]
    pub fn with_target_sub_id(mut self, id: CompId) -> Self {
        self.target_sub_id = Some(id);
        self
    }

    /// Sets the location qualifier.
    #[must_use]
    pub fn with_location_id(mut self, id: CompId) -> Self {
        self.location_id = Some(id);
        self
    }

    /// Returns the key as seen from the counterparty's side: sender and
    /// target swapped. An acceptor stores inbound logon identity this way so
    /// both directions resolve to the same registry entry.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            sender_comp_id: self.target_comp_id.clone(),
            target_comp_id: self.sender_comp_id.clone(),
            sender_sub_id: self.target_sub_id.clone(),
            target_sub_id: self.sender_sub_id.clone(),
            location_id: self.location_id.clone(),
        }
    }

    /// Encodes the key to a stable byte representation for persistence.
    ///
    /// Layout: five length-prefixed segments (`u8` length, then bytes), in
    /// field order. Absent qualifiers encode as a zero length.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.sender_comp_id.len() + self.target_comp_id.len());
        for part in [
            Some(&self.sender_comp_id),
            Some(&self.target_comp_id),
            self.sender_sub_id.as_ref(),
            self.target_sub_id.as_ref(),
            self.location_id.as_ref(),
        ] {
            match part {
                Some(id) => {
                    out.push(id.len() as u8);
                    out.extend_from_slice(id.as_str().as_bytes());
                }
                None => out.push(0),
            }
        }
        out
    }

    /// Decodes a key previously produced by [`SessionKey::encode`].
    ///
    /// # Returns
    /// `None` if the buffer is truncated or a segment is not valid UTF-8.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut offset = 0usize;
        let mut next = |required: bool| -> Option<Option<CompId>> {
            let len = *bytes.get(offset)? as usize;
            offset += 1;
            if len == 0 {
                return if required { None } else { Some(None) };
            }
            let raw = bytes.get(offset..offset + len)?;
            offset += len;
            let s = std::str::from_utf8(raw).ok()?;
            Some(Some(CompId::new(s)?))
        };

        let sender_comp_id = next(true)??;
        let target_comp_id = next(true)??;
        let sender_sub_id = next(false)?;
        let target_sub_id = next(false)?;
        let location_id = next(false)?;
        if offset != bytes.len() {
            return None;
        }

        Some(Self {
            sender_comp_id,
            target_comp_id,
            sender_sub_id,
            target_sub_id,
            location_id,
        })
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.sender_comp_id, self.target_comp_id)
    }
}

/// FIX protocol timestamp with millisecond precision.
///
/// Wire format is `YYYYMMDD-HH:MM:SS.sss` (tag 52 SendingTime, tag 122
/// OrigSendingTime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Milliseconds since Unix epoch (1970-01-01 00:00:00 UTC).
    millis_since_epoch: u64,
}

impl Timestamp {
    /// Creates a timestamp from milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            millis_since_epoch: millis,
        }
    }

    /// Returns the current UTC timestamp.
    #[inline]
    #[must_use]
    pub fn now() -> Self {
        Self {
            millis_since_epoch: Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    /// Returns milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.millis_since_epoch
    }

    /// Absolute distance in milliseconds to another timestamp.
    #[inline]
    #[must_use]
    pub const fn skew_ms(self, other: Self) -> u64 {
        self.millis_since_epoch.abs_diff(other.millis_since_epoch)
    }

    /// Checks whether this timestamp lies within `window_ms` of `reference`.
    ///
    /// Used for the SendingTime replay guard: a message whose SendingTime
    /// differs from the local clock by more than the configured window is
    /// rejected.
    #[inline]
    #[must_use]
    pub const fn within_window(self, reference: Self, window_ms: u64) -> bool {
        self.skew_ms(reference) <= window_ms
    }

    /// Converts to a chrono `DateTime<Utc>`.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis_since_epoch as i64)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Formats the timestamp in FIX format with millisecond precision.
    ///
    /// Format: `YYYYMMDD-HH:MM:SS.sss`
    #[must_use]
    pub fn format_fix(self) -> ArrayString<21> {
        let dt = self.to_datetime();
        let mut buf = ArrayString::new();
        let _ = std::fmt::write(
            &mut buf,
            format_args!("{}", dt.format("%Y%m%d-%H:%M:%S%.3f")),
        );
        buf
    }

    /// Parses a FIX-formatted timestamp.
    ///
    /// Accepts `YYYYMMDD-HH:MM:SS` with an optional fractional part.
    ///
    /// # Returns
    /// `None` if the input does not parse.
    #[must_use]
    pub fn parse_fix(s: &str) -> Option<Self> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y%m%d-%H:%M:%S%.f").ok()?;
        let millis = naive.and_utc().timestamp_millis();
        if millis < 0 {
            return None;
        }
        Some(Self {
            millis_since_epoch: millis as u64,
        })
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            millis_since_epoch: dt.timestamp_millis().max(0) as u64,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fix())
    }
}
