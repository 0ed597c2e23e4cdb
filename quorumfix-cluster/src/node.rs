/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The cluster consensus node.
//!
//! A [`ClusterAgent`] is a poll-driven Raft-style state machine: follower,
//! candidate or leader. It accepts local appends when leading, replicates
//! them to peers, and delivers committed entries in index order to local
//! subscribers.
//!
//! Two departures from textbook Raft, both required by the gateway's
//! partial-partition model:
//! - **Leader stickiness**: a node that heard from a live leader within the
//!   minimum election timeout rejects RequestVote without adopting the
//!   candidate's term. A follower whose inbound side is dead can then flood
//!   votes without deposing a healthy leader.
//! - **Leader session id**: every leadership change derives a fresh
//!   `leader_session_id` carried on AppendEntries; session-layer consumers
//!   use it to discover the current writer.

use bytes::Bytes;
use quorumfix_core::counters::GatewayCounters;
use quorumfix_core::types::{LogIndex, SessionId, Term};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::hard_state::HardState;
use crate::log::{RaftLogEntry, ReplicatedLog};
use crate::messages::{NodeId, RaftMessage};
use crate::streams::{ClusterSubscription, HEADER_LENGTH};
use crate::transport::NodeTransport;

/// Position returned by a claim attempted on a non-leader node.
pub const NOT_LEADER: i64 = -1;

/// Cluster timing and membership configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// This node's stable id.
    pub node_id: NodeId,
    /// The other members' ids.
    pub peer_ids: Vec<NodeId>,
    /// Lower bound of the randomized election timeout.
    pub election_timeout_min_ms: u64,
    /// Upper bound of the randomized election timeout.
    pub election_timeout_max_ms: u64,
    /// Leader heartbeat period, roughly a third of the election timeout.
    pub heartbeat_interval_ms: u64,
    /// Maximum entries shipped per AppendEntries frame.
    pub max_entries_per_append: usize,
    /// Maximum inbound frames processed per poll.
    pub inbound_frame_limit: usize,
}

impl ClusterConfig {
    /// Creates a configuration with default timing.
    #[must_use]
    pub fn new(node_id: NodeId, peer_ids: Vec<NodeId>) -> Self {
        Self {
            node_id,
            peer_ids,
            election_timeout_min_ms: 150,
            election_timeout_max_ms: 300,
            heartbeat_interval_ms: 50,
            max_entries_per_append: 64,
            inbound_frame_limit: 10,
        }
    }

    /// Total cluster size.
    #[must_use]
    pub fn cluster_size(&self) -> usize {
        self.peer_ids.len() + 1
    }

    /// Votes or replicas required for a majority.
    #[must_use]
    pub fn majority(&self) -> usize {
        self.cluster_size() / 2 + 1
    }
}

#[derive(Debug)]
enum Role {
    Follower {
        leader_id: Option<NodeId>,
    },
    Candidate {
        votes: HashSet<NodeId>,
    },
    Leader {
        next_index: HashMap<NodeId, LogIndex>,
        match_index: HashMap<NodeId, LogIndex>,
    },
}

struct Subscriber {
    tx: crossbeam_channel::Sender<RaftLogEntry>,
    position: Arc<AtomicU64>,
}

/// One member of the replication cluster.
pub struct ClusterAgent {
    config: ClusterConfig,
    transport: NodeTransport,
    hard_state: HardState,
    log: ReplicatedLog,
    role: Role,
    commit_index: LogIndex,
    last_applied: LogIndex,
    leader_session_id: u64,
    election_deadline_ms: u64,
    last_heartbeat_sent_ms: u64,
    last_leader_contact_ms: u64,
    claimed_position: u64,
    replicated_position: Arc<AtomicU64>,
    subscribers: Vec<Subscriber>,
    counters: GatewayCounters,
    rng: SmallRng,
}

impl ClusterAgent {
    /// Creates a follower node.
    #[must_use]
    pub fn new(
        config: ClusterConfig,
        transport: NodeTransport,
        hard_state: HardState,
        counters: GatewayCounters,
        now_ms: u64,
    ) -> Self {
        let mut rng = SmallRng::seed_from_u64(0x51F0_D00D ^ u64::from(config.node_id));
        let election_deadline_ms = now_ms + election_jitter(&config, &mut rng);

        Self {
            config,
            transport,
            hard_state,
            log: ReplicatedLog::new(),
            role: Role::Follower { leader_id: None },
            commit_index: LogIndex::new(0),
            last_applied: LogIndex::new(0),
            leader_session_id: 0,
            election_deadline_ms,
            last_heartbeat_sent_ms: 0,
            last_leader_contact_ms: 0,
            claimed_position: 0,
            replicated_position: Arc::new(AtomicU64::new(0)),
            subscribers: Vec::new(),
            counters,
            rng,
        }
    }

    /// This node's id.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    /// Current term.
    #[must_use]
    pub fn current_term(&self) -> Term {
        self.hard_state.current_term()
    }

    /// True when this node currently leads the cluster.
    #[must_use]
    pub fn is_leader(&self) -> bool {
        matches!(self.role, Role::Leader { .. })
    }

    /// True when this node follows a leader (or awaits one).
    #[must_use]
    pub fn is_follower(&self) -> bool {
        matches!(self.role, Role::Follower { .. })
    }

    /// True while this node campaigns for leadership.
    #[must_use]
    pub fn is_candidate(&self) -> bool {
        matches!(self.role, Role::Candidate { .. })
    }

    /// Stream id of the current leader as observed by this node; 0 until a
    /// leader is known. Changes on every leadership transition.
    #[must_use]
    pub fn leader_session_id(&self) -> u64 {
        self.leader_session_id
    }

    /// Highest committed log index.
    #[must_use]
    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    /// Index of the last local log entry.
    #[must_use]
    pub fn last_log_index(&self) -> LogIndex {
        self.log.last_index()
    }

    /// Stream position through the last delivered committed entry,
    /// including per-frame header overhead.
    #[must_use]
    pub fn replicated_position(&self) -> u64 {
        self.replicated_position.load(Ordering::SeqCst)
    }

    /// Registers a committed-entry subscriber.
    pub fn subscribe(&mut self) -> ClusterSubscription {
        let (tx, rx) = crossbeam_channel::unbounded();
        let position = Arc::new(AtomicU64::new(0));
        self.subscribers.push(Subscriber {
            tx,
            position: position.clone(),
        });
        ClusterSubscription::new(rx, position)
    }

    /// Attempts a local append of `payload` tagged with `session_id`.
    ///
    /// # Returns
    /// The claimed stream position after the entry, or [`NOT_LEADER`] when
    /// this node cannot accept writes. The entry becomes visible to
    /// subscribers only once committed.
    pub fn try_claim(&mut self, session_id: SessionId, payload: &[u8]) -> i64 {
        if !self.is_leader() {
            return NOT_LEADER;
        }

        let entry = RaftLogEntry {
            term: self.current_term(),
            index: self.log.last_index().next(),
            session_id,
            payload: Bytes::copy_from_slice(payload),
        };
        self.log.append(entry);
        self.claimed_position += (HEADER_LENGTH + payload.len()) as u64;

        // Single-node clusters commit on their own majority.
        self.advance_leader_commit();
        self.deliver_committed();

        self.claimed_position as i64
    }

    /// Drives the node: drains inbound frames, runs election and heartbeat
    /// timers, advances commit and delivery.
    ///
    /// # Returns
    /// The number of units of work performed, for idle-strategy backoff.
    pub fn poll(&mut self, now_ms: u64) -> usize {
        let mut work = 0;

        for _ in 0..self.config.inbound_frame_limit {
            let Some(frame) = self.transport.try_recv() else {
                break;
            };
            match RaftMessage::decode(&frame) {
                Ok(message) => {
                    self.on_message(message, now_ms);
                    work += 1;
                }
                Err(err) => {
                    warn!(node_id = self.config.node_id, %err, "dropping corrupt frame");
                }
            }
        }

        if self.is_leader() {
            if now_ms.saturating_sub(self.last_heartbeat_sent_ms)
                >= self.config.heartbeat_interval_ms
            {
                self.send_append_entries(now_ms);
                work += 1;
            }
        } else if now_ms >= self.election_deadline_ms {
            self.start_election(now_ms);
            work += 1;
        }

        self.deliver_committed();
        work
    }

    fn on_message(&mut self, message: RaftMessage, now_ms: u64) {
        match message {
            RaftMessage::RequestVote {
                term,
                candidate_id,
                last_log_term,
                last_log_index,
            } => self.on_request_vote(term, candidate_id, last_log_term, last_log_index, now_ms),
            RaftMessage::RequestVoteReply {
                term,
                voter_id,
                vote_granted,
            } => self.on_request_vote_reply(term, voter_id, vote_granted, now_ms),
            RaftMessage::AppendEntries {
                term,
                leader_id,
                leader_session_id,
                prev_log_term,
                prev_log_index,
                leader_commit,
                entries,
            } => self.on_append_entries(
                term,
                leader_id,
                leader_session_id,
                prev_log_term,
                prev_log_index,
                leader_commit,
                entries,
                now_ms,
            ),
            RaftMessage::AppendEntriesReply {
                term,
                follower_id,
                success,
                last_log_index,
            } => self.on_append_entries_reply(term, follower_id, success, last_log_index),
        }
    }

    fn on_request_vote(
        &mut self,
        term: Term,
        candidate_id: NodeId,
        last_log_term: Term,
        last_log_index: LogIndex,
        now_ms: u64,
    ) {
        // Stickiness: with a live leader, refuse without adopting the term.
        // A minority candidate can then spin its term up without deposing a
        // healthy leader; it rejoins through the reply path after healing.
        if self.has_live_leader(now_ms) {
            self.send_to(
                candidate_id,
                &RaftMessage::RequestVoteReply {
                    term: self.current_term(),
                    voter_id: self.config.node_id,
                    vote_granted: false,
                },
            );
            return;
        }

        if term > self.current_term() && self.persist(term, None) {
            self.become_follower(None, now_ms);
        }

        let up_to_date = self.log.candidate_is_up_to_date(last_log_term, last_log_index);
        let may_vote = self
            .hard_state
            .voted_for()
            .is_none_or(|voted| voted == candidate_id);
        let grant = term == self.current_term()
            && matches!(self.role, Role::Follower { .. })
            && may_vote
            && up_to_date;

        if grant {
            if !self.persist(self.current_term(), Some(candidate_id)) {
                return;
            }
            self.reset_election_deadline(now_ms);
            debug!(
                node_id = self.config.node_id,
                candidate_id,
                term = term.value(),
                "vote granted"
            );
        }

        self.send_to(
            candidate_id,
            &RaftMessage::RequestVoteReply {
                term: self.current_term(),
                voter_id: self.config.node_id,
                vote_granted: grant,
            },
        );
    }

    fn on_request_vote_reply(
        &mut self,
        term: Term,
        voter_id: NodeId,
        vote_granted: bool,
        now_ms: u64,
    ) {
        if term > self.current_term() {
            if self.persist(term, None) {
                self.become_follower(None, now_ms);
            }
            return;
        }

        if !vote_granted || term != self.current_term() {
            return;
        }
        let majority = self.config.majority();
        let won = if let Role::Candidate { votes } = &mut self.role {
            votes.insert(voter_id);
            votes.len() >= majority
        } else {
            false
        };
        if won {
            self.become_leader(now_ms);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_append_entries(
        &mut self,
        term: Term,
        leader_id: NodeId,
        leader_session_id: u64,
        prev_log_term: Term,
        prev_log_index: LogIndex,
        leader_commit: LogIndex,
        entries: Vec<RaftLogEntry>,
        now_ms: u64,
    ) {
        if term < self.current_term() {
            // Stale leader: our term in the reply drives its step-down.
            self.send_to(
                leader_id,
                &RaftMessage::AppendEntriesReply {
                    term: self.current_term(),
                    follower_id: self.config.node_id,
                    success: false,
                    last_log_index: self.log.last_index(),
                },
            );
            return;
        }

        if term > self.current_term() && !self.persist(term, None) {
            return;
        }
        self.become_follower(Some(leader_id), now_ms);
        self.last_leader_contact_ms = now_ms;
        self.reset_election_deadline(now_ms);
        self.observe_leader_session(leader_session_id);

        // Consistency check against the preceding entry.
        if self.log.term_at(prev_log_index) != Some(prev_log_term) {
            self.send_to(
                leader_id,
                &RaftMessage::AppendEntriesReply {
                    term: self.current_term(),
                    follower_id: self.config.node_id,
                    success: false,
                    last_log_index: self.log.last_index(),
                },
            );
            return;
        }

        let mut last_new_index = prev_log_index;
        for entry in entries {
            match self.log.term_at(entry.index) {
                Some(existing) if existing == entry.term => {
                    last_new_index = entry.index;
                }
                Some(_) => {
                    self.log.truncate_from(entry.index);
                    last_new_index = entry.index;
                    self.log.append(entry);
                }
                None => {
                    last_new_index = entry.index;
                    self.log.append(entry);
                }
            }
        }

        if leader_commit > self.commit_index {
            self.commit_index = leader_commit.min(last_new_index);
        }
        self.deliver_committed();

        self.send_to(
            leader_id,
            &RaftMessage::AppendEntriesReply {
                term: self.current_term(),
                follower_id: self.config.node_id,
                success: true,
                last_log_index: last_new_index,
            },
        );
    }

    fn on_append_entries_reply(
        &mut self,
        term: Term,
        follower_id: NodeId,
        success: bool,
        last_log_index: LogIndex,
    ) {
        if term > self.current_term() {
            if self.persist(term, None) {
                info!(
                    node_id = self.config.node_id,
                    term = term.value(),
                    "higher term observed, stepping down"
                );
                self.become_follower(None, self.last_heartbeat_sent_ms);
            }
            return;
        }

        let Role::Leader {
            next_index,
            match_index,
        } = &mut self.role
        else {
            return;
        };
        if term != self.hard_state.current_term() {
            return;
        }

        if success {
            match_index.insert(follower_id, last_log_index);
            next_index.insert(follower_id, last_log_index.next());
        } else {
            let current = next_index
                .get(&follower_id)
                .copied()
                .unwrap_or(LogIndex::new(1));
            let backed_off = current.value().saturating_sub(1).max(1);
            let hinted = last_log_index.next().value();
            next_index.insert(follower_id, LogIndex::new(backed_off.min(hinted)));
        }

        self.advance_leader_commit();
        self.deliver_committed();
    }

    fn start_election(&mut self, now_ms: u64) {
        let term = self.current_term().next();
        if !self.persist(term, Some(self.config.node_id)) {
            return;
        }

        let mut votes = HashSet::new();
        votes.insert(self.config.node_id);
        self.role = Role::Candidate { votes };
        self.reset_election_deadline(now_ms);
        self.counters.elections_started().increment();
        info!(
            node_id = self.config.node_id,
            term = term.value(),
            "election started"
        );

        let request = RaftMessage::RequestVote {
            term,
            candidate_id: self.config.node_id,
            last_log_term: self.log.last_term(),
            last_log_index: self.log.last_index(),
        };
        let frame = request.encode();
        self.transport.broadcast(&self.config.peer_ids, &frame);

        // A cluster of one wins immediately.
        if self.config.majority() == 1 {
            self.become_leader(now_ms);
        }
    }

    fn become_leader(&mut self, now_ms: u64) {
        let next = self.log.last_index().next();
        let mut next_index = HashMap::new();
        let mut match_index = HashMap::new();
        for &peer in &self.config.peer_ids {
            next_index.insert(peer, next);
            match_index.insert(peer, LogIndex::new(0));
        }
        self.role = Role::Leader {
            next_index,
            match_index,
        };
        self.claimed_position = self.log_stream_position();

        let session_id = (self.current_term().value() << 16) | u64::from(self.config.node_id);
        self.observe_leader_session(session_id);
        info!(
            node_id = self.config.node_id,
            term = self.current_term().value(),
            leader_session_id = session_id,
            "became leader"
        );

        self.last_heartbeat_sent_ms = now_ms;
        self.send_append_entries(now_ms);
    }

    fn become_follower(&mut self, leader_id: Option<NodeId>, _now_ms: u64) {
        if !matches!(self.role, Role::Follower { .. }) {
            debug!(node_id = self.config.node_id, "reverting to follower");
        }
        self.role = Role::Follower { leader_id };
    }

    fn send_append_entries(&mut self, now_ms: u64) {
        self.last_heartbeat_sent_ms = now_ms;
        let Role::Leader { next_index, .. } = &self.role else {
            return;
        };

        let term = self.hard_state.current_term();
        let mut outgoing = Vec::with_capacity(self.config.peer_ids.len());
        for &peer in &self.config.peer_ids {
            let next = next_index.get(&peer).copied().unwrap_or(LogIndex::new(1));
            let prev_log_index = LogIndex::new(next.value().saturating_sub(1));
            let prev_log_term = self
                .log
                .term_at(prev_log_index)
                .unwrap_or(Term::new(0));
            let entries = self
                .log
                .entries_from(next, self.config.max_entries_per_append);

            outgoing.push((
                peer,
                RaftMessage::AppendEntries {
                    term,
                    leader_id: self.config.node_id,
                    leader_session_id: self.leader_session_id,
                    prev_log_term,
                    prev_log_index,
                    leader_commit: self.commit_index,
                    entries,
                },
            ));
        }

        for (peer, message) in outgoing {
            self.send_to(peer, &message);
        }
    }

    fn advance_leader_commit(&mut self) {
        let Role::Leader { match_index, .. } = &self.role else {
            return;
        };
        let majority = self.config.majority();
        let current_term = self.hard_state.current_term();

        let mut best = self.commit_index;
        let mut candidate = self.commit_index.next();
        while candidate <= self.log.last_index() {
            let replicas = 1 + match_index
                .values()
                .filter(|&&matched| matched >= candidate)
                .count();
            // Only a current-term entry may advance the commit index
            // directly; earlier entries commit transitively through it.
            if replicas >= majority && self.log.term_at(candidate) == Some(current_term) {
                best = candidate;
            }
            candidate = candidate.next();
        }
        self.commit_index = best;
    }

    fn deliver_committed(&mut self) {
        while self.last_applied < self.commit_index {
            let next = self.last_applied.next();
            let Some(entry) = self.log.get(next) else {
                break;
            };
            let entry = entry.clone();
            let advance = (HEADER_LENGTH + entry.payload.len()) as u64;

            self.replicated_position.fetch_add(advance, Ordering::SeqCst);
            self.subscribers.retain(|subscriber| {
                subscriber.position.fetch_add(advance, Ordering::SeqCst);
                subscriber.tx.send(entry.clone()).is_ok()
            });
            self.counters.entries_committed().increment();
            self.last_applied = next;
        }
    }

    fn observe_leader_session(&mut self, leader_session_id: u64) {
        if leader_session_id != 0 && leader_session_id != self.leader_session_id {
            self.leader_session_id = leader_session_id;
            self.counters.leadership_changes().increment();
        }
    }

    fn has_live_leader(&self, now_ms: u64) -> bool {
        match &self.role {
            Role::Leader { .. } => true,
            Role::Follower {
                leader_id: Some(_),
            } => {
                now_ms.saturating_sub(self.last_leader_contact_ms)
                    < self.config.election_timeout_min_ms
            }
            _ => false,
        }
    }

    fn reset_election_deadline(&mut self, now_ms: u64) {
        let jitter = election_jitter(&self.config, &mut self.rng);
        self.election_deadline_ms = now_ms + jitter;
    }

    /// Durably records `(term, voted_for)`. Returns false (and refuses the
    /// action) when persistence fails; consensus must not run ahead of disk.
    fn persist(&mut self, term: Term, voted_for: Option<NodeId>) -> bool {
        match self.hard_state.update(term, voted_for) {
            Ok(()) => true,
            Err(err) => {
                warn!(node_id = self.config.node_id, %err, "hard state write failed");
                false
            }
        }
    }

    fn send_to(&self, peer: NodeId, message: &RaftMessage) {
        self.transport.send(peer, message.encode());
    }

    /// Stream position after the last local log entry, header included.
    fn log_stream_position(&self) -> u64 {
        let mut position = 0u64;
        let mut index = LogIndex::new(1);
        while let Some(entry) = self.log.get(index) {
            position += (HEADER_LENGTH + entry.payload.len()) as u64;
            index = index.next();
        }
        position
    }
}

impl std::fmt::Debug for ClusterAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match &self.role {
            Role::Follower { .. } => "FOLLOWER",
            Role::Candidate { .. } => "CANDIDATE",
            Role::Leader { .. } => "LEADER",
        };
        f.debug_struct("ClusterAgent")
            .field("node_id", &self.config.node_id)
            .field("role", &role)
            .field("term", &self.current_term())
            .field("commit_index", &self.commit_index)
            .field("last_log_index", &self.log.last_index())
            .finish_non_exhaustive()
    }
}

fn election_jitter(config: &ClusterConfig, rng: &mut SmallRng) -> u64 {
    rng.random_range(config.election_timeout_min_ms..=config.election_timeout_max_ms)
}
