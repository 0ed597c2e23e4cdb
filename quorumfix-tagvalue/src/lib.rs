/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # QuorumFix TagValue
//!
//! FIX tag=value wire format for the QuorumFix gateway.
//!
//! This crate provides:
//! - **Checksum**: mod-256 checksum calculation and formatting
//! - **Encoder**: [`FixEncoder`] with automatic BodyLength and CheckSum
//! - **Framing**: [`split_frame`] locating whole messages in a byte stream
//! - **Decoding**: [`DecodedMessage`] typed view of session-relevant fields
//! - **Resend rewrite**: [`mark_possible_duplicate`] for replaying stored frames
//!
//! The gateway core only interprets session-level tags; business messages
//! are classified as [`MsgType::Business`] and pass through opaquely.

pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod fields;
pub mod rewrite;

pub use checksum::{calculate_checksum, format_checksum, parse_checksum};
pub use decoder::{DecodedMessage, FieldIter, split_frame};
pub use encoder::{FixEncoder, SOH};
pub use fields::{MsgType, tags};
pub use rewrite::mark_possible_duplicate;
