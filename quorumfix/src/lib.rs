/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix
//!
//! A clustered FIX gateway core: per-connection session state machines in
//! front of a leader-based replication layer that totally orders accepted
//! traffic across a small cluster.
//!
//! The workspace splits by concern:
//! - [`core`]: shared types, errors, counters, clocks, completion positions
//! - [`tagvalue`]: the FIX tag=value wire format
//! - [`session`]: the session state machine and its seams
//! - [`store`]: message store, session registry, sequence indices
//! - [`cluster`]: consensus node, cluster wire format, clusterable streams
//! - [`transport`]: TCP framing and connection plumbing
//! - [`engine`]: agents, context wiring, configuration
//!
//! ## A minimal acceptor
//!
//! ```no_run
//! use quorumfix::engine::{EngineConfig, EngineContext};
//! use quorumfix::session::{CapturingSink, SessionRole};
//! use quorumfix::core::types::ConnectionId;
//!
//! let context = EngineContext::new(EngineConfig::default()).unwrap();
//! let session = context
//!     .new_session(
//!         SessionRole::Acceptor,
//!         ConnectionId::new(1),
//!         "CLIENT",
//!         Box::new(CapturingSink::new()),
//!     )
//!     .unwrap();
//! let mut manager = context.session_manager();
//! manager.add_session(session);
//! ```

pub use quorumfix_cluster as cluster;
pub use quorumfix_core as core;
pub use quorumfix_engine as engine;
pub use quorumfix_session as session;
pub use quorumfix_store as store;
pub use quorumfix_tagvalue as tagvalue;
pub use quorumfix_transport as transport;

pub use quorumfix_cluster::{ClusterAgent, ClusterableStreams, GatewayPublication};
pub use quorumfix_core::{GatewayCounters, GatewayError, SeqNum, SessionId, SessionKey};
pub use quorumfix_engine::{EngineConfig, EngineContext};
pub use quorumfix_session::{MessageOutcome, Session, SessionRole, SessionState};
