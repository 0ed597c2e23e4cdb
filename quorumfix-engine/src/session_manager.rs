/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The session manager agent.
//!
//! Owns every live session, drains the inbound frame ring, routes decoded
//! messages by connection id and polls each session's timers every cycle.
//! Registry and sequence-index writes are serialized through this agent:
//! it is the single writer.

use crossbeam_channel::Receiver;
use quorumfix_core::clock::EpochClock;
use quorumfix_core::error::GatewayError;
use quorumfix_core::types::ConnectionId;
use quorumfix_session::{Session, SessionState};
use quorumfix_store::SequenceIndex;
use quorumfix_tagvalue::DecodedMessage;
use quorumfix_transport::InboundFrame;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::error_handler::ErrorHandler;

const FRAMES_PER_CYCLE: usize = 64;

/// Agent owning all FIX sessions of the gateway.
pub struct SessionManagerAgent {
    sessions: HashMap<ConnectionId, Session>,
    inbound_rx: Receiver<InboundFrame>,
    clock: Arc<dyn EpochClock>,
    seq_index: Arc<SequenceIndex>,
    error_handler: Arc<dyn ErrorHandler>,
    validate_checksum: bool,
}

impl SessionManagerAgent {
    /// Creates an empty manager draining `inbound_rx`.
    #[must_use]
    pub fn new(
        inbound_rx: Receiver<InboundFrame>,
        clock: Arc<dyn EpochClock>,
        seq_index: Arc<SequenceIndex>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            inbound_rx,
            clock,
            seq_index,
            error_handler,
            validate_checksum: true,
        }
    }

    /// Adopts a session, resuming its persisted sequence numbers when the
    /// registry already knows the endpoint.
    pub fn add_session(&mut self, mut session: Session) {
        if !session.session_id().is_reserved()
            && let Some((sent, received)) = self.seq_index.lookup(session.session_id())
        {
            session.resume_sequences(sent, received);
            debug!(
                session_id = session.session_id().value(),
                next_sent = sent.value(),
                expected = received.value(),
                "resumed session sequences"
            );
        }
        self.sessions.insert(session.connection_id(), session);
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Read access for tests and admin queries.
    #[must_use]
    pub fn session(&self, connection_id: ConnectionId) -> Option<&Session> {
        self.sessions.get(&connection_id)
    }

    /// Mutable access for admin operations (logout, disconnect).
    pub fn session_mut(&mut self, connection_id: ConnectionId) -> Option<&mut Session> {
        self.sessions.get_mut(&connection_id)
    }

    fn drain_inbound(&mut self) -> usize {
        let mut handled = 0;
        while handled < FRAMES_PER_CYCLE {
            let Ok(inbound) = self.inbound_rx.try_recv() else {
                break;
            };
            handled += 1;

            let Some(session) = self.sessions.get_mut(&inbound.connection_id) else {
                warn!(
                    connection_id = inbound.connection_id.value(),
                    "frame for unknown connection dropped"
                );
                continue;
            };

            match DecodedMessage::decode(&inbound.frame, self.validate_checksum) {
                Ok(decoded) => {
                    session.dispatch(&decoded, &inbound.frame);
                }
                Err(err) => {
                    // Undecodable traffic ends the session; framing already
                    // passed, so this is a malformed peer.
                    self.error_handler.on_error(&GatewayError::Decode(err));
                    session.disconnect();
                }
            }
        }
        handled
    }

    fn poll_sessions(&mut self) -> usize {
        let now_ms = self.clock.now_ms();
        let mut actions = 0;
        for session in self.sessions.values_mut() {
            actions += session.poll(now_ms);
        }
        actions
    }

    fn reap_disconnected(&mut self) -> usize {
        let disconnected: Vec<ConnectionId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.state() == SessionState::Disconnected)
            .map(|(&connection_id, _)| connection_id)
            .collect();

        for connection_id in &disconnected {
            if let Some(session) = self.sessions.remove(connection_id) {
                self.checkpoint(&session);
                debug!(
                    connection_id = connection_id.value(),
                    session_id = session.session_id().value(),
                    "session drained"
                );
            }
        }

        if !disconnected.is_empty()
            && let Err(err) = self.seq_index.flush()
        {
            self.error_handler.on_error(&GatewayError::Store(err));
        }
        disconnected.len()
    }

    fn checkpoint(&self, session: &Session) {
        if !session.session_id().is_reserved() {
            self.seq_index.record(
                session.session_id(),
                session.next_sent_seq(),
                session.expected_received_seq(),
            );
        }
    }
}

impl Agent for SessionManagerAgent {
    fn role_name(&self) -> &'static str {
        "session-manager"
    }

    fn do_work(&mut self) -> usize {
        self.drain_inbound() + self.poll_sessions() + self.reap_disconnected()
    }

    fn on_close(&mut self) {
        for session in self.sessions.values_mut() {
            session.disconnect();
        }
        let sessions: Vec<ConnectionId> = self.sessions.keys().copied().collect();
        for connection_id in sessions {
            if let Some(session) = self.sessions.remove(&connection_id) {
                self.checkpoint(&session);
            }
        }
        if let Err(err) = self.seq_index.flush() {
            self.error_handler.on_error(&GatewayError::Store(err));
        }
    }
}

impl std::fmt::Debug for SessionManagerAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManagerAgent")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
