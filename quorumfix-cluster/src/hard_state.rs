/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Persistent consensus state.
//!
//! `current_term` and `voted_for` must reach disk before the node grants a
//! vote or starts an election; otherwise a restart could double-vote within
//! one term. The record is rewritten in place and fsynced on every update.
//!
//! Record layout, little endian:
//! `current_term: u64 | has_vote: u8 | voted_for: u16 | crc32c: u32`

use crate::messages::NodeId;
use quorumfix_core::error::ClusterError;
use quorumfix_core::types::Term;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

const RECORD_LEN: usize = 8 + 1 + 2 + 4;

/// Durable `(current_term, voted_for)` pair.
#[derive(Debug)]
pub struct HardState {
    file: Option<File>,
    current_term: Term,
    voted_for: Option<NodeId>,
}

impl HardState {
    /// Opens (or creates) the hard-state file and loads the stored record.
    ///
    /// A record failing the crc check is ignored: the node restarts at term
    /// 0 and rejoins as a follower, which is safe (it can only have voted in
    /// terms it no longer remembers at the cost of re-electing).
    ///
    /// # Errors
    /// Returns `ClusterError::HardState` on filesystem faults.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClusterError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())
            .map_err(io_error)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw).map_err(io_error)?;

        let (current_term, voted_for) = if raw.len() >= RECORD_LEN {
            let stored_crc = u32::from_le_bytes(raw[11..15].try_into().unwrap());
            if crc32c::crc32c(&raw[..11]) == stored_crc {
                let term = Term::new(u64::from_le_bytes(raw[0..8].try_into().unwrap()));
                let voted = if raw[8] != 0 {
                    Some(u16::from_le_bytes(raw[9..11].try_into().unwrap()))
                } else {
                    None
                };
                (term, voted)
            } else {
                warn!("hard state crc mismatch, starting from term 0");
                (Term::new(0), None)
            }
        } else {
            (Term::new(0), None)
        };

        Ok(Self {
            file: Some(file),
            current_term,
            voted_for,
        })
    }

    /// Creates an in-memory hard state that is never persisted. For tests
    /// and simulated clusters only.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self {
            file: None,
            current_term: Term::new(0),
            voted_for: None,
        }
    }

    /// The current term.
    #[must_use]
    pub fn current_term(&self) -> Term {
        self.current_term
    }

    /// Who this node voted for in the current term, if anyone.
    #[must_use]
    pub fn voted_for(&self) -> Option<NodeId> {
        self.voted_for
    }

    /// Durably updates the pair. Synchronous: returns only after fsync.
    ///
    /// # Errors
    /// Returns `ClusterError::HardState` when the write or sync fails; the
    /// caller must not proceed with the vote.
    pub fn update(&mut self, term: Term, voted_for: Option<NodeId>) -> Result<(), ClusterError> {
        if let Some(file) = &mut self.file {
            let mut record = [0u8; RECORD_LEN];
            record[0..8].copy_from_slice(&term.value().to_le_bytes());
            record[8] = u8::from(voted_for.is_some());
            record[9..11].copy_from_slice(&voted_for.unwrap_or(0).to_le_bytes());
            let crc = crc32c::crc32c(&record[..11]);
            record[11..15].copy_from_slice(&crc.to_le_bytes());

            file.seek(SeekFrom::Start(0)).map_err(io_error)?;
            file.write_all(&record).map_err(io_error)?;
            file.sync_data().map_err(io_error)?;
        }
        self.current_term = term;
        self.voted_for = voted_for;
        Ok(())
    }
}

fn io_error(err: std::io::Error) -> ClusterError {
    ClusterError::HardState(err.to_string())
}
