/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Sequence-number index persistence.
//!
//! One record per session holding the last committed `(sent_seq,
//! received_seq)` pair. The index is single-writer; it is rewritten as a
//! whole on [`SequenceIndex::flush`] and fsynced, so a crash leaves either
//! the old table or the new one.
//!
//! Record layout, little endian:
//! `session_id: u64 | sent_seq: u64 | received_seq: u64 | crc32c: u32`

use parking_lot::Mutex;
use quorumfix_core::error::StoreError;
use quorumfix_core::types::{SeqNum, SessionId};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::warn;

const RECORD_LEN: usize = 8 + 8 + 8 + 4;

#[derive(Debug)]
struct Inner {
    file: File,
    slots: HashMap<u64, (u64, u64)>,
    dirty: bool,
}

/// Persistent per-session sequence-number checkpoints.
#[derive(Debug)]
pub struct SequenceIndex {
    inner: Mutex<Inner>,
}

impl SequenceIndex {
    /// Opens (or creates) an index file and loads all valid records.
    ///
    /// Records failing the crc check are skipped with a warning; the next
    /// flush rewrites a clean table.
    ///
    /// # Errors
    /// Returns `StoreError::Io` on filesystem faults.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())
            .map_err(io_error)?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw).map_err(io_error)?;

        let mut slots = HashMap::new();
        for chunk in raw.chunks_exact(RECORD_LEN) {
            let stored_crc = u32::from_le_bytes(chunk[24..28].try_into().unwrap());
            if crc32c::crc32c(&chunk[..24]) != stored_crc {
                warn!("skipping sequence index record with bad crc");
                continue;
            }
            let session_id = u64::from_le_bytes(chunk[0..8].try_into().unwrap());
            let sent = u64::from_le_bytes(chunk[8..16].try_into().unwrap());
            let received = u64::from_le_bytes(chunk[16..24].try_into().unwrap());
            slots.insert(session_id, (sent, received));
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                file,
                slots,
                dirty: false,
            }),
        })
    }

    /// Records the latest committed pair for a session.
    pub fn record(&self, session_id: SessionId, sent: SeqNum, received: SeqNum) {
        let mut inner = self.inner.lock();
        inner
            .slots
            .insert(session_id.value(), (sent.value(), received.value()));
        inner.dirty = true;
    }

    /// Looks up the last committed pair for a session.
    #[must_use]
    pub fn lookup(&self, session_id: SessionId) -> Option<(SeqNum, SeqNum)> {
        self.inner
            .lock()
            .slots
            .get(&session_id.value())
            .map(|&(sent, received)| (SeqNum::new(sent), SeqNum::new(received)))
    }

    /// Rewrites the table to disk and fsyncs, if anything changed.
    ///
    /// # Errors
    /// Returns `StoreError::Io` on filesystem faults.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.dirty {
            return Ok(());
        }

        let mut table = Vec::with_capacity(inner.slots.len() * RECORD_LEN);
        for (&session_id, &(sent, received)) in &inner.slots {
            let start = table.len();
            table.extend_from_slice(&session_id.to_le_bytes());
            table.extend_from_slice(&sent.to_le_bytes());
            table.extend_from_slice(&received.to_le_bytes());
            let crc = crc32c::crc32c(&table[start..]);
            table.extend_from_slice(&crc.to_le_bytes());
        }

        inner.file.seek(SeekFrom::Start(0)).map_err(io_error)?;
        inner.file.set_len(0).map_err(io_error)?;
        inner.file.write_all(&table).map_err(io_error)?;
        inner.file.sync_data().map_err(io_error)?;
        inner.dirty = false;
        Ok(())
    }

    /// Returns the number of sessions with a checkpoint.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Returns true if no session has a checkpoint.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn io_error(err: std::io::Error) -> StoreError {
    StoreError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lookup_flush_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.idx");

        {
            let index = SequenceIndex::open(&path).unwrap();
            index.record(SessionId::new(1), SeqNum::new(10), SeqNum::new(20));
            index.record(SessionId::new(2), SeqNum::new(3), SeqNum::new(4));
            index.flush().unwrap();
        }

        let index = SequenceIndex::open(&path).unwrap();
        assert_eq!(
            index.lookup(SessionId::new(1)),
            Some((SeqNum::new(10), SeqNum::new(20)))
        );
        assert_eq!(
            index.lookup(SessionId::new(2)),
            Some((SeqNum::new(3), SeqNum::new(4)))
        );
        assert_eq!(index.lookup(SessionId::new(9)), None);
    }

    #[test]
    fn test_rerecord_overwrites_slot() {
        let dir = tempfile::tempdir().unwrap();
        let index = SequenceIndex::open(dir.path().join("seq.idx")).unwrap();

        index.record(SessionId::new(1), SeqNum::new(1), SeqNum::new(1));
        index.record(SessionId::new(1), SeqNum::new(5), SeqNum::new(7));
        assert_eq!(
            index.lookup(SessionId::new(1)),
            Some((SeqNum::new(5), SeqNum::new(7)))
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_flush_without_changes_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let index = SequenceIndex::open(dir.path().join("seq.idx")).unwrap();
        index.flush().unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_corrupt_record_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.idx");

        {
            let index = SequenceIndex::open(&path).unwrap();
            index.record(SessionId::new(1), SeqNum::new(10), SeqNum::new(20));
            index.record(SessionId::new(2), SeqNum::new(30), SeqNum::new(40));
            index.flush().unwrap();
        }

        let mut raw = std::fs::read(&path).unwrap();
        raw[5] ^= 0xFF;
        std::fs::write(&path, &raw).unwrap();

        let index = SequenceIndex::open(&path).unwrap();
        assert_eq!(index.len(), 1);
    }
}
