/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session-to-stream publication adapter.

use quorumfix_cluster::ClusterableStreams;
use quorumfix_core::types::{SeqNum, SessionId};
use quorumfix_session::InboundPublication;

/// Routes accepted inbound messages onto the clusterable streams.
///
/// In clustered mode the claim succeeds only on the leader and the message
/// becomes visible once committed; session-layer sequence numbers make the
/// at-least-once delivery idempotent downstream.
#[derive(Debug, Clone)]
pub struct ReplicatedInboundPublication {
    streams: ClusterableStreams,
}

impl ReplicatedInboundPublication {
    /// Creates an adapter over the process streams.
    #[must_use]
    pub fn new(streams: ClusterableStreams) -> Self {
        Self { streams }
    }
}

impl InboundPublication for ReplicatedInboundPublication {
    fn try_publish(&mut self, session_id: SessionId, _seq_num: SeqNum, frame: &[u8]) -> i64 {
        self.streams.publication(session_id).try_claim(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumfix_cluster::HEADER_LENGTH;

    #[test]
    fn test_publishes_to_solo_streams() {
        let streams = ClusterableStreams::solo();
        let subscription = streams.subscription();
        let mut publication = ReplicatedInboundPublication::new(streams.clone());

        let position =
            publication.try_publish(SessionId::new(9), SeqNum::new(2), b"frame-bytes");
        assert_eq!(position, (HEADER_LENGTH + 11) as i64);

        let entry = subscription.try_next().unwrap();
        assert_eq!(entry.session_id, SessionId::new(9));
        assert_eq!(entry.payload.as_ref(), b"frame-bytes");
    }
}
