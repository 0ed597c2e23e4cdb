/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix Session
//!
//! FIX session layer for the QuorumFix gateway.
//!
//! This crate provides:
//! - **State machine**: [`Session`] with explicit state and role enums,
//!   driven by decoded inbound messages and wall-clock polls
//! - **Sequence discipline**: gap detection, resend requests, duplicate and
//!   sequence-reset handling
//! - **Liveness**: heartbeat and test-request timers
//! - **Proxy**: [`SessionProxy`] encoding all outbound admin messages
//! - **Seams**: [`OutboundSink`], [`InboundPublication`] and
//!   [`AuthenticationStrategy`] for transport, replication and credential
//!   checks

pub mod auth;
pub mod config;
pub mod liveness;
pub mod proxy;
pub mod publication;
pub mod sequence;
pub mod session;
pub mod state;

pub use auth::{AcceptAll, AuthenticationStrategy};
pub use config::SessionConfig;
pub use liveness::LivenessTracker;
pub use proxy::{CapturingSink, OutboundSink, SessionProxy};
pub use publication::{BackpressuredPublication, InboundPublication, NoopPublication};
pub use sequence::{SequenceCheck, SequenceCounters};
pub use session::{MessageOutcome, Session};
pub use state::{SessionRole, SessionState};
