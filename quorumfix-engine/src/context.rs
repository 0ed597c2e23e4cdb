/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Engine context and lifecycle.
//!
//! Construction is two-phase: [`EngineContext::new`] builds the persistent
//! state, counters and solo streams; [`EngineContext::enable_cluster`]
//! constructs the consensus node and swaps the streams to routed mode. The
//! cycle between context, streams and cluster is resolved by building the
//! node first and injecting the streams afterwards, before any session
//! exists.
//!
//! Shutdown runs in reverse dependency order: streams latch their final
//! position, observers await it, then the indices flush.

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use quorumfix_cluster::{ClusterAgent, ClusterableStreams, HardState, TransportHub};
use quorumfix_core::clock::{EpochClock, SystemEpochClock};
use quorumfix_core::counters::GatewayCounters;
use quorumfix_core::error::GatewayError;
use quorumfix_core::types::ConnectionId;
use quorumfix_session::{
    AcceptAll, AuthenticationStrategy, OutboundSink, Session, SessionProxy, SessionRole,
};
use quorumfix_store::{MemoryStore, SequenceIndex, SessionRegistry};
use quorumfix_transport::InboundFrame;
use std::sync::Arc;
use tracing::info;

use crate::agent::Agent;
use crate::config::EngineConfig;
use crate::error_handler::{ErrorHandler, TracingErrorHandler};
use crate::publication::ReplicatedInboundPublication;
use crate::session_manager::SessionManagerAgent;

/// Shared wiring for one gateway process.
pub struct EngineContext {
    config: EngineConfig,
    counters: GatewayCounters,
    clock: Arc<dyn EpochClock>,
    error_handler: Arc<dyn ErrorHandler>,
    auth: Arc<dyn AuthenticationStrategy>,
    registry: Arc<SessionRegistry>,
    seq_index: Arc<SequenceIndex>,
    streams: ClusterableStreams,
    cluster: Option<Arc<Mutex<ClusterAgent>>>,
    inbound_tx: Sender<InboundFrame>,
    inbound_rx: Receiver<InboundFrame>,
}

impl EngineContext {
    /// Phase one: validates the configuration and opens persistent state.
    /// Streams start in solo mode.
    ///
    /// # Errors
    /// Returns `GatewayError` on invalid configuration or storage faults.
    pub fn new(config: EngineConfig) -> Result<Self, GatewayError> {
        config.validate().map_err(|err| GatewayError::Fatal {
            reason: err.to_string(),
        })?;
        std::fs::create_dir_all(&config.data_dir)?;

        let registry = Arc::new(SessionRegistry::open(
            config.data_dir.join("sessions.reg"),
        )?);
        let seq_index = Arc::new(SequenceIndex::open(config.data_dir.join("sequence.idx"))?);
        let (inbound_tx, inbound_rx) = unbounded();

        Ok(Self {
            config,
            counters: GatewayCounters::new(),
            clock: Arc::new(SystemEpochClock),
            error_handler: Arc::new(TracingErrorHandler),
            auth: Arc::new(AcceptAll),
            registry,
            seq_index,
            streams: ClusterableStreams::solo(),
            cluster: None,
            inbound_tx,
            inbound_rx,
        })
    }

    /// Replaces the wall clock; for deterministic tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn EpochClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the error handler.
    #[must_use]
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    /// Replaces the acceptor authentication strategy.
    #[must_use]
    pub fn with_authentication(mut self, auth: Arc<dyn AuthenticationStrategy>) -> Self {
        self.auth = auth;
        self
    }

    /// Phase two: constructs the consensus node on `hub` and routes the
    /// streams through it. Must run before any session is created.
    ///
    /// # Errors
    /// Returns `GatewayError` when the configuration is not clustered or
    /// the hard state cannot be opened.
    pub fn enable_cluster(&mut self, hub: &TransportHub) -> Result<(), GatewayError> {
        if !self.config.is_clustered() {
            return Err(GatewayError::Fatal {
                reason: "enable_cluster on a solo configuration".to_string(),
            });
        }

        let hard_state = HardState::open(self.config.data_dir.join("cluster.hard"))?;
        let agent = ClusterAgent::new(
            self.config.cluster_config(),
            hub.register(self.config.node_id),
            hard_state,
            self.counters.clone(),
            self.clock.now_ms(),
        );
        let agent = Arc::new(Mutex::new(agent));
        self.streams = ClusterableStreams::clustered(agent.clone());
        self.cluster = Some(agent);
        info!(
            node_id = self.config.node_id,
            peers = ?self.config.peer_ids,
            channel = %self.config.cluster_channel,
            "cluster replication enabled"
        );
        Ok(())
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process-wide counters handle.
    #[must_use]
    pub fn counters(&self) -> GatewayCounters {
        self.counters.clone()
    }

    /// The process streams.
    #[must_use]
    pub fn streams(&self) -> ClusterableStreams {
        self.streams.clone()
    }

    /// The persistent session registry.
    #[must_use]
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// The sequence-number index.
    #[must_use]
    pub fn seq_index(&self) -> Arc<SequenceIndex> {
        self.seq_index.clone()
    }

    /// Producer side of the inbound frame ring, for transport pumps.
    #[must_use]
    pub fn inbound_sender(&self) -> Sender<InboundFrame> {
        self.inbound_tx.clone()
    }

    /// Builds the session manager agent draining this context's ring.
    #[must_use]
    pub fn session_manager(&self) -> SessionManagerAgent {
        SessionManagerAgent::new(
            self.inbound_rx.clone(),
            self.clock.clone(),
            self.seq_index.clone(),
            self.error_handler.clone(),
        )
    }

    /// Builds the agent polling the consensus node, when clustered.
    #[must_use]
    pub fn cluster_poll_agent(&self) -> Option<ClusterPollAgent> {
        self.cluster.as_ref().map(|agent| ClusterPollAgent {
            agent: agent.clone(),
            clock: self.clock.clone(),
        })
    }

    /// Creates a session wired to this context's streams, registry and
    /// counters.
    ///
    /// # Errors
    /// Returns `GatewayError` when the comp ids are invalid or the
    /// initiator's session id cannot be allocated.
    pub fn new_session(
        &self,
        role: SessionRole,
        connection_id: ConnectionId,
        target_comp_id: &str,
        sink: Box<dyn OutboundSink>,
    ) -> Result<Session, GatewayError> {
        let session_config = self
            .config
            .session_config(target_comp_id)
            .map_err(|err| GatewayError::Fatal {
                reason: err.to_string(),
            })?;
        let proxy = SessionProxy::new(
            &session_config,
            self.clock.clone(),
            self.counters.clone(),
            sink,
        );

        Session::new(
            role,
            session_config,
            connection_id,
            proxy,
            Arc::new(MemoryStore::new()),
            self.registry.clone(),
            Box::new(ReplicatedInboundPublication::new(self.streams.clone())),
            self.auth.clone(),
            self.counters.clone(),
            self.clock.clone(),
        )
    }

    /// Latches the final stream position, awaits it, and flushes the
    /// indices. Downstream resources close in reverse dependency order.
    ///
    /// # Errors
    /// Returns `GatewayError` when a final flush fails.
    pub fn shutdown(&self) -> Result<(), GatewayError> {
        self.streams.complete();
        let final_position = self.streams.completion_position().await_position();
        self.seq_index.flush()?;
        info!(final_position, "engine context drained");
        Ok(())
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("clustered", &self.cluster.is_some())
            .field("node_id", &self.config.node_id)
            .finish_non_exhaustive()
    }
}

/// Agent driving the consensus node from the host loop.
pub struct ClusterPollAgent {
    agent: Arc<Mutex<ClusterAgent>>,
    clock: Arc<dyn EpochClock>,
}

impl Agent for ClusterPollAgent {
    fn role_name(&self) -> &'static str {
        "cluster-node"
    }

    fn do_work(&mut self) -> usize {
        self.agent.lock().poll(self.clock.now_ms())
    }
}

impl std::fmt::Debug for ClusterPollAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterPollAgent").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use quorumfix_core::clock::ManualClock;
    use quorumfix_core::types::Timestamp;
    use quorumfix_session::{CapturingSink, SessionState};
    use quorumfix_tagvalue::{DecodedMessage, FixEncoder, MsgType, tags};

    fn test_config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            data_dir: dir.to_path_buf(),
            ..EngineConfig::default()
        }
    }

    fn client_frame(clock: &ManualClock, msg_type: &str, seq: u64) -> bytes::Bytes {
        let mut encoder = FixEncoder::new("FIX.4.4");
        encoder.put_str(tags::MSG_TYPE, msg_type);
        encoder.put_str(tags::SENDER_COMP_ID, "CLIENT");
        encoder.put_str(tags::TARGET_COMP_ID, "GATEWAY");
        encoder.put_uint(tags::MSG_SEQ_NUM, seq);
        encoder.put_timestamp(tags::SENDING_TIME, Timestamp::from_millis(clock.now_ms()));
        if msg_type == "A" {
            encoder.put_uint(tags::ENCRYPT_METHOD, 0);
            encoder.put_uint(tags::HEART_BT_INT, 30);
        }
        encoder.finish().freeze()
    }

    #[test]
    fn test_solo_engine_accepts_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::shared(1_700_000_000_000);
        let context = EngineContext::new(test_config(dir.path()))
            .unwrap()
            .with_clock(clock.clone());

        let sink = CapturingSink::new();
        let connection_id = ConnectionId::new(1);
        let session = context
            .new_session(
                SessionRole::Acceptor,
                connection_id,
                "CLIENT",
                Box::new(sink.clone()),
            )
            .unwrap();

        let mut manager = context.session_manager();
        manager.add_session(session);
        assert_eq!(manager.len(), 1);

        // Peer logs on, then sends a business message.
        let tx = context.inbound_sender();
        tx.send(InboundFrame {
            connection_id,
            frame: client_frame(&clock, "A", 1),
        })
        .unwrap();
        tx.send(InboundFrame {
            connection_id,
            frame: client_frame(&clock, "D", 2),
        })
        .unwrap();

        let work = manager.do_work();
        assert!(work >= 2);

        let session = manager.session(connection_id).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.expected_received_seq().value(), 3);

        // Both accepted frames were published to the stream.
        assert!(context.streams().replicated_position() > 0);
        assert_eq!(context.counters().messages_received().get(), 2);

        // The logon reply went out through the sink.
        let reply = DecodedMessage::decode(&sink.frames()[0], true).unwrap();
        assert_eq!(reply.msg_type, MsgType::Logon);
    }

    #[test]
    fn test_disconnected_sessions_are_reaped_and_checkpointed() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::shared(1_700_000_000_000);
        let context = EngineContext::new(test_config(dir.path()))
            .unwrap()
            .with_clock(clock.clone());

        let connection_id = ConnectionId::new(2);
        let session = context
            .new_session(
                SessionRole::Acceptor,
                connection_id,
                "CLIENT",
                Box::new(CapturingSink::new()),
            )
            .unwrap();
        let mut manager = context.session_manager();
        manager.add_session(session);

        let tx = context.inbound_sender();
        tx.send(InboundFrame {
            connection_id,
            frame: client_frame(&clock, "A", 1),
        })
        .unwrap();
        manager.do_work();
        let session_id = manager.session(connection_id).unwrap().session_id();

        // Peer logs out; session drains and its sequences checkpoint.
        tx.send(InboundFrame {
            connection_id,
            frame: client_frame(&clock, "5", 2),
        })
        .unwrap();
        manager.do_work();
        assert!(manager.is_empty());

        let (sent, received) = context.seq_index().lookup(session_id).unwrap();
        assert!(sent.value() >= 2);
        assert_eq!(received.value(), 3);
    }

    #[test]
    fn test_session_resumes_checkpointed_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::shared(1_700_000_000_000);
        let context = EngineContext::new(test_config(dir.path()))
            .unwrap()
            .with_clock(clock.clone());

        // Initiators resolve their session id at construction, so the
        // checkpoint written under that id is found on the next connect.
        let first = context
            .new_session(
                SessionRole::Initiator,
                ConnectionId::new(3),
                "CLIENT",
                Box::new(CapturingSink::new()),
            )
            .unwrap();
        let session_id = first.session_id();
        context
            .seq_index()
            .record(session_id, 7u64.into(), 9u64.into());

        let mut manager = context.session_manager();
        let second = context
            .new_session(
                SessionRole::Initiator,
                ConnectionId::new(4),
                "CLIENT",
                Box::new(CapturingSink::new()),
            )
            .unwrap();
        manager.add_session(second);

        let resumed = manager.session(ConnectionId::new(4)).unwrap();
        assert_eq!(resumed.next_sent_seq().value(), 7);
        assert_eq!(resumed.expected_received_seq().value(), 9);
    }

    #[test]
    fn test_enable_cluster_rejects_solo_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = EngineContext::new(test_config(dir.path())).unwrap();
        let hub = TransportHub::new();
        assert!(context.enable_cluster(&hub).is_err());
    }

    #[test]
    fn test_clustered_context_routes_streams() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            peer_ids: vec![2, 3],
            ..test_config(dir.path())
        };
        let mut context = EngineContext::new(config).unwrap();
        let hub = TransportHub::new();
        context.enable_cluster(&hub).unwrap();

        // Not leader yet: claims are refused.
        let streams = context.streams();
        assert!(!streams.is_writable());
        let mut agent = context.cluster_poll_agent().unwrap();
        let _ = agent.do_work();
        assert!(
            streams
                .publication(quorumfix_core::types::SessionId::new(1))
                .try_claim(b"early")
                < 0
        );
    }

    #[test]
    fn test_shutdown_latches_completion() {
        let dir = tempfile::tempdir().unwrap();
        let context = EngineContext::new(test_config(dir.path())).unwrap();
        context.shutdown().unwrap();
        assert_eq!(context.streams().completion_position().poll(), Some(0));
    }
}
