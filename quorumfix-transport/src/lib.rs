/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix Transport
//!
//! TCP plumbing for the QuorumFix gateway.
//!
//! This crate provides:
//! - **Codec**: [`FixFrameCodec`] framing whole FIX messages over a byte
//!   stream
//! - **Connections**: [`FixConnection`] and [`FixAcceptor`] helpers
//! - **Bridge**: [`pump_inbound`] forwarding decoded frames from the async
//!   socket world into the synchronous agent world

pub mod codec;
pub mod connection;

pub use codec::{CodecError, FixFrameCodec};
pub use connection::{FixAcceptor, FixConnection, InboundFrame, pump_inbound};
