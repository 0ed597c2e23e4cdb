/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-memory message store implementation.
//!
//! Stores messages in a `BTreeMap` for efficient range queries. Not
//! persistent; a gateway that must survive restarts archives frames
//! externally and serves resends from the archive instead.

use crate::traits::MessageStore;
use bytes::Bytes;
use parking_lot::RwLock;
use quorumfix_core::error::StoreError;
use quorumfix_core::types::SeqNum;
use std::collections::BTreeMap;

/// In-memory message store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: RwLock<BTreeMap<u64, Bytes>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.read().len()
    }
}

impl MessageStore for MemoryStore {
    fn store(&self, seq_num: SeqNum, message: &[u8]) -> Result<(), StoreError> {
        self.messages
            .write()
            .insert(seq_num.value(), Bytes::copy_from_slice(message));
        Ok(())
    }

    fn get(&self, seq_num: SeqNum) -> Option<Bytes> {
        self.messages.read().get(&seq_num.value()).cloned()
    }

    fn range(&self, begin: SeqNum, end: SeqNum) -> Vec<(SeqNum, Bytes)> {
        let end = if end.value() == 0 {
            u64::MAX
        } else {
            end.value()
        };
        self.messages
            .read()
            .range(begin.value()..=end)
            .map(|(&seq, bytes)| (SeqNum::new(seq), bytes.clone()))
            .collect()
    }

    fn highest_stored(&self) -> Option<SeqNum> {
        self.messages
            .read()
            .last_key_value()
            .map(|(&seq, _)| SeqNum::new(seq))
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.messages.write().clear();
        Ok(())
    }
}
