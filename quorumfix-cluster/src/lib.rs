/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix Cluster
//!
//! Leader-based replication for the QuorumFix gateway.
//!
//! A small cluster (typically three nodes) totally orders inbound and
//! outbound FIX traffic. This crate provides:
//! - **Log**: [`RaftLogEntry`] and the in-memory [`ReplicatedLog`]
//! - **Wire**: [`RaftMessage`] frames with crc32c protection
//! - **Hard state**: [`HardState`] persisted synchronously before votes
//! - **Node**: [`ClusterAgent`], the poll-driven consensus state machine
//! - **Transport**: [`TransportHub`] in-process switchboard with frame-drop
//!   fault injection
//! - **Streams**: [`ClusterableStreams`], [`GatewayPublication`] and
//!   [`ClusterSubscription`] routing traffic through consensus when
//!   clustered, or directly when solo

pub mod hard_state;
pub mod log;
pub mod messages;
pub mod node;
pub mod streams;
pub mod transport;

pub use hard_state::HardState;
pub use log::{RaftLogEntry, ReplicatedLog};
pub use messages::{NodeId, RaftMessage};
pub use node::{ClusterAgent, ClusterConfig};
pub use streams::{
    ClusterSubscription, ClusterableStreams, GatewayPublication, HEADER_LENGTH,
};
pub use transport::{NodeTransport, TransportHub};
