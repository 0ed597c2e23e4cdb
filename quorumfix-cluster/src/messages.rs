/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Cluster wire format.
//!
//! Frames are length-prefixed, crc32c-protected and zero-padded to the
//! transport's fragment boundary:
//!
//! `length: u32 | tag: u8 | fields (LE) | crc32c: u32 | padding`
//!
//! where `length` covers tag plus fields and the crc covers the same bytes.

use crate::log::RaftLogEntry;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use quorumfix_core::error::ClusterError;
use quorumfix_core::types::{LogIndex, SessionId, Term};

/// Stable node identifier, known at startup.
pub type NodeId = u16;

/// Fragment boundary frames are padded to.
pub const FRAGMENT_ALIGNMENT: usize = 32;

const TAG_REQUEST_VOTE: u8 = 1;
const TAG_REQUEST_VOTE_REPLY: u8 = 2;
const TAG_APPEND_ENTRIES: u8 = 3;
const TAG_APPEND_ENTRIES_REPLY: u8 = 4;

/// Consensus traffic between cluster nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaftMessage {
    /// Candidate solicits a vote.
    RequestVote {
        /// Candidate's term.
        term: Term,
        /// Candidate's node id.
        candidate_id: NodeId,
        /// Term of the candidate's last log entry.
        last_log_term: Term,
        /// Index of the candidate's last log entry.
        last_log_index: LogIndex,
    },
    /// Vote decision.
    RequestVoteReply {
        /// Voter's current term.
        term: Term,
        /// Voter's node id.
        voter_id: NodeId,
        /// Whether the vote was granted.
        vote_granted: bool,
    },
    /// Leader replicates entries; with none, a heartbeat.
    AppendEntries {
        /// Leader's term.
        term: Term,
        /// Leader's node id.
        leader_id: NodeId,
        /// Stream id under which the current leader publishes.
        leader_session_id: u64,
        /// Term of the entry preceding `entries`.
        prev_log_term: Term,
        /// Index of the entry preceding `entries`.
        prev_log_index: LogIndex,
        /// Leader's commit index.
        leader_commit: LogIndex,
        /// Entries to append, possibly empty.
        entries: Vec<RaftLogEntry>,
    },
    /// Follower's append verdict.
    AppendEntriesReply {
        /// Follower's current term.
        term: Term,
        /// Follower's node id.
        follower_id: NodeId,
        /// Whether the entries were accepted.
        success: bool,
        /// Follower's last log index, as a backtracking hint.
        last_log_index: LogIndex,
    },
}

impl RaftMessage {
    /// Encodes the message as a padded, crc-protected frame.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut content = BytesMut::with_capacity(64);
        match self {
            Self::RequestVote {
                term,
                candidate_id,
                last_log_term,
                last_log_index,
            } => {
                content.put_u8(TAG_REQUEST_VOTE);
                content.put_u64_le(term.value());
                content.put_u16_le(*candidate_id);
                content.put_u64_le(last_log_term.value());
                content.put_u64_le(last_log_index.value());
            }
            Self::RequestVoteReply {
                term,
                voter_id,
                vote_granted,
            } => {
                content.put_u8(TAG_REQUEST_VOTE_REPLY);
                content.put_u64_le(term.value());
                content.put_u16_le(*voter_id);
                content.put_u8(u8::from(*vote_granted));
            }
            Self::AppendEntries {
                term,
                leader_id,
                leader_session_id,
                prev_log_term,
                prev_log_index,
                leader_commit,
                entries,
            } => {
                content.put_u8(TAG_APPEND_ENTRIES);
                content.put_u64_le(term.value());
                content.put_u16_le(*leader_id);
                content.put_u64_le(*leader_session_id);
                content.put_u64_le(prev_log_term.value());
                content.put_u64_le(prev_log_index.value());
                content.put_u64_le(leader_commit.value());
                content.put_u32_le(entries.len() as u32);
                for entry in entries {
                    content.put_u64_le(entry.term.value());
                    content.put_u64_le(entry.index.value());
                    content.put_u64_le(entry.session_id.value());
                    content.put_u32_le(entry.payload.len() as u32);
                    content.put_slice(&entry.payload);
                }
            }
            Self::AppendEntriesReply {
                term,
                follower_id,
                success,
                last_log_index,
            } => {
                content.put_u8(TAG_APPEND_ENTRIES_REPLY);
                content.put_u64_le(term.value());
                content.put_u16_le(*follower_id);
                content.put_u8(u8::from(*success));
                content.put_u64_le(last_log_index.value());
            }
        }

        let crc = crc32c::crc32c(&content);
        let unpadded = 4 + content.len() + 4;
        let padded = unpadded.div_ceil(FRAGMENT_ALIGNMENT) * FRAGMENT_ALIGNMENT;

        let mut frame = BytesMut::with_capacity(padded);
        frame.put_u32_le(content.len() as u32);
        frame.put_slice(&content);
        frame.put_u32_le(crc);
        frame.resize(padded, 0);
        frame.freeze()
    }

    /// Decodes one frame.
    ///
    /// # Errors
    /// Returns `ClusterError::CorruptFrame` on truncation, crc mismatch or
    /// an unknown tag.
    pub fn decode(frame: &[u8]) -> Result<Self, ClusterError> {
        if frame.len() < 4 {
            return Err(corrupt("frame shorter than length prefix"));
        }
        let mut buf = frame;
        let content_len = buf.get_u32_le() as usize;
        if buf.remaining() < content_len + 4 {
            return Err(corrupt("frame truncated"));
        }
        let content = &frame[4..4 + content_len];
        let mut crc_bytes = &frame[4 + content_len..4 + content_len + 4];
        let declared_crc = crc_bytes.get_u32_le();
        if crc32c::crc32c(content) != declared_crc {
            return Err(corrupt("crc mismatch"));
        }

        let mut buf = content;
        let tag = buf.get_u8();
        match tag {
            TAG_REQUEST_VOTE => {
                if buf.remaining() < 8 + 2 + 8 + 8 {
                    return Err(corrupt("short RequestVote"));
                }
                Ok(Self::RequestVote {
                    term: Term::new(buf.get_u64_le()),
                    candidate_id: buf.get_u16_le(),
                    last_log_term: Term::new(buf.get_u64_le()),
                    last_log_index: LogIndex::new(buf.get_u64_le()),
                })
            }
            TAG_REQUEST_VOTE_REPLY => {
                if buf.remaining() < 8 + 2 + 1 {
                    return Err(corrupt("short RequestVoteReply"));
                }
                Ok(Self::RequestVoteReply {
                    term: Term::new(buf.get_u64_le()),
                    voter_id: buf.get_u16_le(),
                    vote_granted: buf.get_u8() != 0,
                })
            }
            TAG_APPEND_ENTRIES => {
                if buf.remaining() < 8 + 2 + 8 + 8 + 8 + 8 + 4 {
                    return Err(corrupt("short AppendEntries"));
                }
                let term = Term::new(buf.get_u64_le());
                let leader_id = buf.get_u16_le();
                let leader_session_id = buf.get_u64_le();
                let prev_log_term = Term::new(buf.get_u64_le());
                let prev_log_index = LogIndex::new(buf.get_u64_le());
                let leader_commit = LogIndex::new(buf.get_u64_le());
                let count = buf.get_u32_le() as usize;

                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    if buf.remaining() < 8 + 8 + 8 + 4 {
                        return Err(corrupt("short log entry header"));
                    }
                    let entry_term = Term::new(buf.get_u64_le());
                    let index = LogIndex::new(buf.get_u64_le());
                    let session_id = SessionId::new(buf.get_u64_le());
                    let payload_len = buf.get_u32_le() as usize;
                    if buf.remaining() < payload_len {
                        return Err(corrupt("short log entry payload"));
                    }
                    let payload = Bytes::copy_from_slice(&buf[..payload_len]);
                    buf.advance(payload_len);
                    entries.push(RaftLogEntry {
                        term: entry_term,
                        index,
                        session_id,
                        payload,
                    });
                }

                Ok(Self::AppendEntries {
                    term,
                    leader_id,
                    leader_session_id,
                    prev_log_term,
                    prev_log_index,
                    leader_commit,
                    entries,
                })
            }
            TAG_APPEND_ENTRIES_REPLY => {
                if buf.remaining() < 8 + 2 + 1 + 8 {
                    return Err(corrupt("short AppendEntriesReply"));
                }
                Ok(Self::AppendEntriesReply {
                    term: Term::new(buf.get_u64_le()),
                    follower_id: buf.get_u16_le(),
                    success: buf.get_u8() != 0,
                    last_log_index: LogIndex::new(buf.get_u64_le()),
                })
            }
            other => Err(corrupt(&format!("unknown frame tag {other}"))),
        }
    }

    /// The term carried by any message variant.
    #[must_use]
    pub fn term(&self) -> Term {
        match self {
            Self::RequestVote { term, .. }
            | Self::RequestVoteReply { term, .. }
            | Self::AppendEntries { term, .. }
            | Self::AppendEntriesReply { term, .. } => *term,
        }
    }
}

fn corrupt(reason: &str) -> ClusterError {
    ClusterError::CorruptFrame {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<RaftLogEntry> {
        vec![
            RaftLogEntry {
                term: Term::new(2),
                index: LogIndex::new(7),
                session_id: SessionId::new(3),
                payload: Bytes::from_static(b"hello"),
            },
            RaftLogEntry {
                term: Term::new(2),
                index: LogIndex::new(8),
                session_id: SessionId::RESERVED,
                payload: Bytes::new(),
            },
        ]
    }

    #[test]
    fn test_frames_are_fragment_aligned() {
        let messages = [
            RaftMessage::RequestVote {
                term: Term::new(5),
                candidate_id: 2,
                last_log_term: Term::new(4),
                last_log_index: LogIndex::new(10),
            },
            RaftMessage::AppendEntries {
                term: Term::new(5),
                leader_id: 1,
                leader_session_id: 0x5_0001,
                prev_log_term: Term::new(4),
                prev_log_index: LogIndex::new(9),
                leader_commit: LogIndex::new(9),
                entries: sample_entries(),
            },
        ];
        for message in messages {
            let frame = message.encode();
            assert_eq!(frame.len() % FRAGMENT_ALIGNMENT, 0);
        }
    }

    #[test]
    fn test_round_trip_all_variants() {
        let messages = [
            RaftMessage::RequestVote {
                term: Term::new(3),
                candidate_id: 2,
                last_log_term: Term::new(2),
                last_log_index: LogIndex::new(14),
            },
            RaftMessage::RequestVoteReply {
                term: Term::new(3),
                voter_id: 1,
                vote_granted: true,
            },
            RaftMessage::AppendEntries {
                term: Term::new(3),
                leader_id: 2,
                leader_session_id: 0x3_0002,
                prev_log_term: Term::new(2),
                prev_log_index: LogIndex::new(14),
                leader_commit: LogIndex::new(12),
                entries: sample_entries(),
            },
            RaftMessage::AppendEntriesReply {
                term: Term::new(3),
                follower_id: 3,
                success: false,
                last_log_index: LogIndex::new(11),
            },
        ];

        for message in messages {
            let frame = message.encode();
            let decoded = RaftMessage::decode(&frame).unwrap();
            assert_eq!(decoded, message);
            assert_eq!(decoded.term(), Term::new(3));
        }
    }

    #[test]
    fn test_corrupt_frames_rejected() {
        let frame = RaftMessage::RequestVoteReply {
            term: Term::new(1),
            voter_id: 1,
            vote_granted: true,
        }
        .encode();

        // Flip a content byte.
        let mut bad = BytesMut::from(&frame[..]);
        bad[6] ^= 0xFF;
        assert!(RaftMessage::decode(&bad).is_err());

        // Truncation.
        assert!(RaftMessage::decode(&frame[..3]).is_err());
        assert!(RaftMessage::decode(&[]).is_err());
    }
}
