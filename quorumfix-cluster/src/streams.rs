/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Clusterable streams.
//!
//! [`ClusterableStreams`] is the routing seam between the session layer and
//! the transport: clustered deployments order every publication through the
//! consensus node, solo deployments append straight to local subscribers.
//! Either way consumers see committed entries in index order and a
//! monotonic `replicated_position` that accounts a fixed per-frame header.

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use quorumfix_core::completion::CompletionPosition;
use quorumfix_core::types::{LogIndex, SessionId, Term};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::log::RaftLogEntry;
use crate::node::ClusterAgent;

/// Per-frame header overhead included in stream positions.
pub const HEADER_LENGTH: usize = 32;

/// Ordered feed of committed entries for one local consumer.
#[derive(Debug)]
pub struct ClusterSubscription {
    rx: Receiver<RaftLogEntry>,
    position: Arc<AtomicU64>,
}

impl ClusterSubscription {
    pub(crate) fn new(rx: Receiver<RaftLogEntry>, position: Arc<AtomicU64>) -> Self {
        Self { rx, position }
    }

    /// Hands up to `limit` committed entries to `handler`, in order.
    ///
    /// # Returns
    /// The number of entries handled.
    pub fn poll(&self, mut handler: impl FnMut(&RaftLogEntry), limit: usize) -> usize {
        let mut handled = 0;
        while handled < limit {
            match self.rx.try_recv() {
                Ok(entry) => {
                    handler(&entry);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Takes the next committed entry, if one is pending.
    #[must_use]
    pub fn try_next(&self) -> Option<RaftLogEntry> {
        self.rx.try_recv().ok()
    }

    /// Stream position through the last committed entry, header included.
    #[must_use]
    pub fn replicated_position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct SoloCore {
    subscribers: Mutex<Vec<(Sender<RaftLogEntry>, Arc<AtomicU64>)>>,
    position: AtomicU64,
    next_index: AtomicU64,
}

impl SoloCore {
    fn publish(&self, session_id: SessionId, payload: &[u8]) -> i64 {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = RaftLogEntry {
            term: Term::new(0),
            index: LogIndex::new(index),
            session_id,
            payload: Bytes::copy_from_slice(payload),
        };

        let advance = (HEADER_LENGTH + payload.len()) as u64;
        let position = self.position.fetch_add(advance, Ordering::SeqCst) + advance;

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(tx, sub_position)| {
            sub_position.fetch_add(advance, Ordering::SeqCst);
            tx.send(entry.clone()).is_ok()
        });
        position as i64
    }

    fn subscribe(&self) -> ClusterSubscription {
        let (tx, rx) = unbounded();
        let position = Arc::new(AtomicU64::new(0));
        self.subscribers.lock().push((tx, position.clone()));
        ClusterSubscription::new(rx, position)
    }
}

#[derive(Debug, Clone)]
enum StreamsInner {
    Solo(Arc<SoloCore>),
    Clustered(Arc<Mutex<ClusterAgent>>),
}

/// Stream routing for one gateway process.
#[derive(Debug, Clone)]
pub struct ClusterableStreams {
    inner: StreamsInner,
    completion: CompletionPosition,
}

impl ClusterableStreams {
    /// Creates streams that bypass consensus entirely.
    #[must_use]
    pub fn solo() -> Self {
        Self {
            inner: StreamsInner::Solo(Arc::new(SoloCore::default())),
            completion: CompletionPosition::new(),
        }
    }

    /// Creates streams routed through a consensus node.
    #[must_use]
    pub fn clustered(agent: Arc<Mutex<ClusterAgent>>) -> Self {
        Self {
            inner: StreamsInner::Clustered(agent),
            completion: CompletionPosition::new(),
        }
    }

    /// True when this process may accept writes right now.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        match &self.inner {
            StreamsInner::Solo(_) => true,
            StreamsInner::Clustered(agent) => agent.lock().is_leader(),
        }
    }

    /// The observed leader's stream id; solo streams report a fixed 1.
    #[must_use]
    pub fn leader_session_id(&self) -> u64 {
        match &self.inner {
            StreamsInner::Solo(_) => 1,
            StreamsInner::Clustered(agent) => agent.lock().leader_session_id(),
        }
    }

    /// Creates a publication tagged with `session_id`.
    #[must_use]
    pub fn publication(&self, session_id: SessionId) -> GatewayPublication {
        GatewayPublication {
            inner: self.inner.clone(),
            session_id,
        }
    }

    /// Creates an ordered committed-entry subscription.
    #[must_use]
    pub fn subscription(&self) -> ClusterSubscription {
        match &self.inner {
            StreamsInner::Solo(core) => core.subscribe(),
            StreamsInner::Clustered(agent) => agent.lock().subscribe(),
        }
    }

    /// Stream position through the last committed entry.
    #[must_use]
    pub fn replicated_position(&self) -> u64 {
        match &self.inner {
            StreamsInner::Solo(core) => core.position.load(Ordering::SeqCst),
            StreamsInner::Clustered(agent) => agent.lock().replicated_position(),
        }
    }

    /// The completion latch observers await at shutdown.
    #[must_use]
    pub fn completion_position(&self) -> CompletionPosition {
        self.completion.clone()
    }

    /// Latches the final stream position for shutdown observers.
    pub fn complete(&self) {
        self.completion.set(self.replicated_position());
    }
}

/// Append endpoint for one stream.
#[derive(Debug, Clone)]
pub struct GatewayPublication {
    inner: StreamsInner,
    session_id: SessionId,
}

impl GatewayPublication {
    /// The stream tag this publication writes under.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Attempts to claim and commit `payload` onto the stream.
    ///
    /// # Returns
    /// The stream position after the message, or a negative value when the
    /// claim is refused (not leader, or back-pressured). Callers retry after
    /// polling.
    pub fn try_claim(&self, payload: &[u8]) -> i64 {
        match &self.inner {
            StreamsInner::Solo(core) => core.publish(self.session_id, payload),
            StreamsInner::Clustered(agent) => {
                agent.lock().try_claim(self.session_id, payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hard_state::HardState;
    use crate::node::ClusterConfig;
    use crate::transport::TransportHub;
    use quorumfix_core::counters::GatewayCounters;

    #[test]
    fn test_solo_round_trip() {
        let streams = ClusterableStreams::solo();
        let subscription = streams.subscription();
        let publication = streams.publication(SessionId::new(5));

        let position = publication.try_claim(b"0123456789abcdef");
        assert_eq!(position, (HEADER_LENGTH + 16) as i64);
        assert!(streams.is_writable());
        assert_eq!(streams.leader_session_id(), 1);
        assert_eq!(streams.replicated_position(), position as u64);

        let entry = subscription.try_next().unwrap();
        assert_eq!(entry.session_id, SessionId::new(5));
        assert_eq!(entry.payload.as_ref(), b"0123456789abcdef");
        assert_eq!(subscription.replicated_position(), position as u64);
    }

    #[test]
    fn test_solo_subscription_poll_limit() {
        let streams = ClusterableStreams::solo();
        let subscription = streams.subscription();
        let publication = streams.publication(SessionId::new(1));

        for _ in 0..5 {
            assert!(publication.try_claim(b"x") > 0);
        }

        let mut seen = 0;
        assert_eq!(subscription.poll(|_| seen += 1, 3), 3);
        assert_eq!(subscription.poll(|_| seen += 1, 10), 2);
        assert_eq!(seen, 5);
    }

    #[test]
    fn test_clustered_single_node_claim() {
        let hub = TransportHub::new();
        let agent = ClusterAgent::new(
            ClusterConfig::new(1, vec![]),
            hub.register(1),
            HardState::ephemeral(),
            GatewayCounters::new(),
            0,
        );
        let agent = Arc::new(Mutex::new(agent));
        let streams = ClusterableStreams::clustered(agent.clone());

        // Not writable until the node elects itself.
        let publication = streams.publication(SessionId::new(2));
        assert!(publication.try_claim(b"early") < 0);

        let mut now = 0;
        while !streams.is_writable() {
            agent.lock().poll(now);
            now += 1;
            assert!(now < 1_000);
        }

        let subscription = streams.subscription();
        let position = publication.try_claim(b"payload");
        assert!(position > 0);
        assert_eq!(streams.replicated_position(), position as u64);
        assert!(subscription.try_next().is_some());
    }

    #[test]
    fn test_completion_position_latch() {
        let streams = ClusterableStreams::solo();
        let publication = streams.publication(SessionId::new(1));
        publication.try_claim(b"last");

        let completion = streams.completion_position();
        assert_eq!(completion.poll(), None);
        streams.complete();
        assert_eq!(completion.poll(), Some(streams.replicated_position()));
    }
}
