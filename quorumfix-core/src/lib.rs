/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix Core
//!
//! Shared types for the QuorumFix clustered FIX gateway.
//!
//! This crate provides:
//! - **Identifiers**: [`SeqNum`], [`SessionId`], [`ConnectionId`], [`Term`], [`LogIndex`]
//! - **Session keys**: [`SessionKey`] composite of comp ids with a stable byte encoding
//! - **Timestamps**: [`Timestamp`] with FIX wire formatting and skew checks
//! - **Errors**: unified `thiserror` hierarchy for all gateway operations
//! - **Counters**: [`GatewayCounters`] process-wide observable counters
//! - **Clocks**: [`EpochClock`] abstraction with system and manual implementations
//! - **Completion positions**: [`CompletionPosition`] one-shot shutdown latches

pub mod clock;
pub mod completion;
pub mod counters;
pub mod error;
pub mod types;

pub use clock::{EpochClock, ManualClock, SystemEpochClock};
pub use completion::CompletionPosition;
pub use counters::GatewayCounters;
pub use error::{ClusterError, DecodeError, EncodeError, GatewayError, Result, SessionError, StoreError};
pub use types::{CompId, ConnectionId, LogIndex, SeqNum, SessionId, SessionKey, Term, Timestamp};
