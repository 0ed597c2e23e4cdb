/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix Store
//!
//! Persistence for the QuorumFix gateway.
//!
//! This crate provides:
//! - **Message store**: [`MessageStore`] trait and [`MemoryStore`], the
//!   resend source for outbound traffic
//! - **Session registry**: [`SessionRegistry`] persistent `SessionKey` to
//!   `SessionId` mapping
//! - **Sequence index**: [`SequenceIndex`] last committed sequence-number
//!   pairs per session
//!
//! All stores are synchronous: agents are poll-driven and must not block or
//! await inside `do_work`.

pub mod memory;
pub mod registry;
pub mod seq_index;
pub mod traits;

pub use memory::MemoryStore;
pub use registry::SessionRegistry;
pub use seq_index::SequenceIndex;
pub use traits::MessageStore;
