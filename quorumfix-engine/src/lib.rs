/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix Engine
//!
//! Host wiring for the QuorumFix gateway.
//!
//! This crate provides:
//! - **Agents**: the [`Agent`] `do_work` contract, [`AgentRunner`] thread
//!   host and [`BackoffIdleStrategy`]
//! - **Session manager**: [`SessionManagerAgent`] owning every session and
//!   draining the inbound frame rings
//! - **Context**: [`EngineContext`] two-phase construction and orderly
//!   shutdown over completion positions
//! - **Configuration**: [`EngineConfig`] with every deployment option
//! - **Error handling**: [`ErrorHandler`] seam with a tracing-backed default

pub mod agent;
pub mod config;
pub mod context;
pub mod error_handler;
pub mod publication;
pub mod session_manager;

pub use agent::{Agent, AgentRunner, BackoffIdleStrategy};
pub use config::{ConfigError, EngineConfig};
pub use context::{ClusterPollAgent, EngineContext};
pub use error_handler::{CollectingErrorHandler, ErrorHandler, TracingErrorHandler};
pub use publication::ReplicatedInboundPublication;
pub use session_manager::SessionManagerAgent;
