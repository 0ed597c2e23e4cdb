/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Persistent session-id registry.
//!
//! Maps a [`SessionKey`] to a stable [`SessionId`] so that a reconnecting
//! counterparty resumes with the same id and therefore the correct sequence
//! numbers. The mapping is an append-only file of crc-protected records;
//! a torn tail record is dropped at load and the file truncated to the last
//! valid record.
//!
//! Record layout, little endian:
//! `session_id: u64 | key_len: u16 | key_bytes | crc32c: u32`
//! where the crc covers id, length and key bytes.

use parking_lot::Mutex;
use quorumfix_core::error::StoreError;
use quorumfix_core::types::{SessionId, SessionKey};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

const RECORD_HEADER_LEN: usize = 8 + 2;
const RECORD_CRC_LEN: usize = 4;

#[derive(Debug)]
struct Inner {
    file: File,
    by_key: HashMap<SessionKey, SessionId>,
    by_id: HashMap<SessionId, SessionKey>,
    next_id: u64,
}

/// Persistent `SessionKey` to `SessionId` mapping.
///
/// Allocation is monotonic; released ids are never reused within a process
/// lifetime. Single writer, serialized through the session manager agent.
#[derive(Debug)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    /// Opens (or creates) a registry file and loads all valid records.
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

        let mut by_key = HashMap::new();
        let mut by_id = HashMap::new();
        let mut next_id: u64 = SessionId::RESERVED.value() + 1;
        let mut valid_len = 0usize;

        let mut offset = 0usize;
        while offset + RECORD_HEADER_LEN + RECORD_CRC_LEN <= raw.len() {
            let id = u64::from_le_bytes(raw[offset..offset + 8].try_into().unwrap());
            let key_len =
                u16::from_le_bytes(raw[offset + 8..offset + 10].try_into().unwrap()) as usize;
            let payload_end = offset + RECORD_HEADER_LEN + key_len;
            if payload_end + RECORD_CRC_LEN > raw.len() {
                break;
            }

            let stored_crc = u32::from_le_bytes(
                raw[payload_end..payload_end + RECORD_CRC_LEN]
                    .try_into()
                    .unwrap(),
            );
            let actual_crc = crc32c::crc32c(&raw[offset..payload_end]);
            if stored_crc != actual_crc {
                warn!(offset, "dropping registry tail with bad crc");
                break;
            }

            let Some(key) = SessionKey::decode(&raw[offset + RECORD_HEADER_LEN..payload_end])
            else {
                warn!(offset, "dropping registry tail with undecodable key");
                break;
            };

            let session_id = SessionId::new(id);
            by_key.insert(key.clone(), session_id);
            by_id.insert(session_id, key);
            next_id = next_id.max(id + 1);
            offset = payload_end + RECORD_CRC_LEN;
            valid_len = offset;
        }

        if valid_len != raw.len() {
            file.set_len(valid_len as u64).map_err(io_error)?;
        }
        file.seek(SeekFrom::End(0)).map_err(io_error)?;

        debug!(sessions = by_key.len(), next_id, "session registry loaded");

        Ok(Self {
            inner: Mutex::new(Inner {
                file,
                by_key,
                by_id,
                next_id,
            }),
        })
    }

    /// Returns the id mapped to `key`, allocating and persisting a new one
    /// if the key is unknown.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the new record cannot be written durably.
    pub fn lookup_or_allocate(&self, key: &SessionKey) -> Result<SessionId, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.by_key.get(key) {
            return Ok(id);
        }

        let id = SessionId::new(inner.next_id);
        inner.next_id += 1;

        let key_bytes = key.encode();
        let mut record = Vec::with_capacity(RECORD_HEADER_LEN + key_bytes.len() + RECORD_CRC_LEN);
        record.extend_from_slice(&id.value().to_le_bytes());
        record.extend_from_slice(&(key_bytes.len() as u16).to_le_bytes());
        record.extend_from_slice(&key_bytes);
        let crc = crc32c::crc32c(&record);
        record.extend_from_slice(&crc.to_le_bytes());

        inner.file.write_all(&record).map_err(io_error)?;
        inner.file.sync_data().map_err(io_error)?;

        inner.by_key.insert(key.clone(), id);
        inner.by_id.insert(id, key.clone());
        debug!(session_id = id.value(), %key, "allocated session id");
        Ok(id)
    }

    /// Releases an id. The in-memory mapping is removed; the id is not
    /// reused because allocation stays monotonic.
    pub fn release(&self, id: SessionId) {
        let mut inner = self.inner.lock();
        if let Some(key) = inner.by_id.remove(&id) {
            inner.by_key.remove(&key);
        }
    }

    /// Returns the key currently mapped to `id`.
    #[must_use]
    pub fn key_for(&self, id: SessionId) -> Option<SessionKey> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    /// Returns the number of live mappings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().by_key.len()
    }

    /// Returns true if no mappings are live.
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
    use quorumfix_core::types::CompId;
    use std::fs;

    fn key(sender: &str, target: &str) -> SessionKey {
        SessionKey::new(CompId::new(sender).unwrap(), CompId::new(target).unwrap())
    }

    #[test]
    fn test_allocate_is_monotonic_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.reg");
        let registry = SessionRegistry::open(&path).unwrap();

        let a = registry.lookup_or_allocate(&key("A", "GW")).unwrap();
        let b = registry.lookup_or_allocate(&key("B", "GW")).unwrap();
        assert!(b > a);
        assert!(!a.is_reserved());

        // Same key resolves to the same id.
        assert_eq!(registry.lookup_or_allocate(&key("A", "GW")).unwrap(), a);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.reg");

        let first = {
            let registry = SessionRegistry::open(&path).unwrap();
            registry.lookup_or_allocate(&key("INIT", "ACCEPT")).unwrap()
        };

        let registry = SessionRegistry::open(&path).unwrap();
        assert_eq!(
            registry.lookup_or_allocate(&key("INIT", "ACCEPT")).unwrap(),
            first
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_does_not_reuse_id() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::open(dir.path().join("sessions.reg")).unwrap();

        let a = registry.lookup_or_allocate(&key("A", "GW")).unwrap();
        registry.release(a);
        assert!(registry.key_for(a).is_none());

        let again = registry.lookup_or_allocate(&key("A", "GW")).unwrap();
        assert!(again > a);
    }

    #[test]
    fn test_torn_tail_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.reg");

        {
            let registry = SessionRegistry::open(&path).unwrap();
            registry.lookup_or_allocate(&key("A", "GW")).unwrap();
            registry.lookup_or_allocate(&key("B", "GW")).unwrap();
        }

        // Append half a record.
        let mut raw = fs::read(&path).unwrap();
        let good_len = raw.len();
        raw.extend_from_slice(&[3u8, 0, 0, 0, 0]);
        fs::write(&path, &raw).unwrap();

        let registry = SessionRegistry::open(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(fs::metadata(&path).unwrap().len() as usize, good_len);

        // New allocations continue past the surviving records.
        let c = registry.lookup_or_allocate(&key("C", "GW")).unwrap();
        assert_eq!(c.value(), 3);
    }

    #[test]
    fn test_corrupt_crc_drops_tail_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.reg");

        {
            let registry = SessionRegistry::open(&path).unwrap();
            registry.lookup_or_allocate(&key("A", "GW")).unwrap();
            registry.lookup_or_allocate(&key("B", "GW")).unwrap();
        }

        // Flip a byte in the second record's key area.
        let mut raw = fs::read(&path).unwrap();
        let len = raw.len();
        raw[len - 6] ^= 0xFF;
        fs::write(&path, &raw).unwrap();

        let registry = SessionRegistry::open(&path).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
