/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message store trait definition.
//!
//! Implementations persist outgoing messages so resend requests can be
//! served. The interface is synchronous and must return promptly: it is
//! called from poll-driven agents that may not block.

use bytes::Bytes;
use quorumfix_core::error::StoreError;
use quorumfix_core::types::SeqNum;

/// Abstract interface for outbound FIX message storage.
pub trait MessageStore: Send + Sync {
    /// Stores an outgoing message for potential resend.
    ///
    /// # Errors
    /// Returns `StoreError` if the message cannot be stored.
    fn store(&self, seq_num: SeqNum, message: &[u8]) -> Result<(), StoreError>;

    /// Retrieves a single stored message.
    fn get(&self, seq_num: SeqNum) -> Option<Bytes>;

    /// Retrieves stored messages in `[begin, end]`, ascending.
    ///
    /// An `end` of 0 means "through the highest stored sequence number".
    /// Sequence numbers with no stored message are simply absent from the
    /// result; the resend path covers those with gap fills.
    fn range(&self, begin: SeqNum, end: SeqNum) -> Vec<(SeqNum, Bytes)>;

    /// Returns the highest stored sequence number, if any.
    fn highest_stored(&self) -> Option<SeqNum>;

    /// Clears all stored messages.
    ///
    /// # Errors
    /// Returns `StoreError` if the reset fails.
    fn reset(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullStore;

    impl MessageStore for NullStore {
        fn store(&self, _seq_num: SeqNum, _message: &[u8]) -> Result<(), StoreError> {
            Ok(())
        }

        fn get(&self, _seq_num: SeqNum) -> Option<Bytes> {
            None
        }

        fn range(&self, _begin: SeqNum, _end: SeqNum) -> Vec<(SeqNum, Bytes)> {
            Vec::new()
        }

        fn highest_stored(&self) -> Option<SeqNum> {
            None
        }

        fn reset(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_trait_object_safety() {
        let store: Box<dyn MessageStore> = Box::new(NullStore);
        assert!(store.store(SeqNum::new(1), b"frame").is_ok());
        assert!(store.get(SeqNum::new(1)).is_none());
        assert!(store.highest_stored().is_none());
    }
}
