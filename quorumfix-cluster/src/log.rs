/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The replicated log.
//!
//! Indices are dense and 1-origin; index 0 means "before the first entry"
//! and carries term 0. For any committed index all nodes agree on
//! `(term, payload)`, and a committed prefix is never rewritten; conflict
//! truncation only ever removes uncommitted suffixes.

use bytes::Bytes;
use quorumfix_core::types::{LogIndex, SessionId, Term};

/// One entry of the replicated log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftLogEntry {
    /// Election epoch the entry was created in.
    pub term: Term,
    /// Dense position in the log.
    pub index: LogIndex,
    /// Stream tag; [`SessionId::RESERVED`] marks cluster control traffic.
    pub session_id: SessionId,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

/// In-memory log store.
#[derive(Debug, Default)]
pub struct ReplicatedLog {
    entries: Vec<RaftLogEntry>,
}

impl ReplicatedLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the last entry, or 0 when empty.
    #[must_use]
    pub fn last_index(&self) -> LogIndex {
        self.entries
            .last()
            .map_or(LogIndex::new(0), |entry| entry.index)
    }

    /// Term of the last entry, or 0 when empty.
    #[must_use]
    pub fn last_term(&self) -> Term {
        self.entries.last().map_or(Term::new(0), |entry| entry.term)
    }

    /// Term of the entry at `index`; index 0 carries term 0.
    #[must_use]
    pub fn term_at(&self, index: LogIndex) -> Option<Term> {
        if index.value() == 0 {
            return Some(Term::new(0));
        }
        self.get(index).map(|entry| entry.term)
    }

    /// Returns the entry at `index`.
    #[must_use]
    pub fn get(&self, index: LogIndex) -> Option<&RaftLogEntry> {
        let offset = index.value().checked_sub(1)? as usize;
        self.entries.get(offset)
    }

    /// Appends one entry; its index must be exactly `last_index + 1`.
    pub fn append(&mut self, entry: RaftLogEntry) {
        debug_assert_eq!(entry.index, self.last_index().next(), "log must be dense");
        self.entries.push(entry);
    }

    /// Removes every entry at `index` and beyond.
    pub fn truncate_from(&mut self, index: LogIndex) {
        let keep = index.value().saturating_sub(1) as usize;
        self.entries.truncate(keep);
    }

    /// Clones up to `max` entries starting at `from`.
    #[must_use]
    pub fn entries_from(&self, from: LogIndex, max: usize) -> Vec<RaftLogEntry> {
        if from.value() == 0 {
            return Vec::new();
        }
        let start = (from.value() - 1) as usize;
        if start >= self.entries.len() {
            return Vec::new();
        }
        let end = (start + max).min(self.entries.len());
        self.entries[start..end].to_vec()
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the log holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Election up-to-dateness check: whether a candidate log ending in
    /// `(last_term, last_index)` is at least as current as this one.
    ///
    /// Compared lexicographically by `(term, index)`.
    #[must_use]
    pub fn candidate_is_up_to_date(&self, last_term: Term, last_index: LogIndex) -> bool {
        (last_term, last_index) >= (self.last_term(), self.last_index())
    }
}
