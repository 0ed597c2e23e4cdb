/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Simulated three-node cluster under frame-drop faults.
//!
//! Time is simulated: every poll round advances the clock by one
//! millisecond, so ten simulated seconds bound each convergence loop.

use parking_lot::Mutex;
use quorumfix_cluster::{
    ClusterAgent, ClusterConfig, ClusterableStreams, HEADER_LENGTH, HardState, TransportHub,
};
use quorumfix_core::counters::GatewayCounters;
use quorumfix_core::types::SessionId;
use std::sync::Arc;

const PAYLOAD: &[u8] = b"0123456789abcdef";
const POSITION_AFTER_MESSAGE: u64 = (PAYLOAD.len() + HEADER_LENGTH) as u64;

/// Ten simulated seconds, in 1 ms poll rounds.
const TIMEOUT_ROUNDS: u64 = 10_000;

struct NodeRunner {
    id: u16,
    agent: Arc<Mutex<ClusterAgent>>,
    streams: ClusterableStreams,
    hub: TransportHub,
    _state_dir: tempfile::TempDir,
}

impl NodeRunner {
    fn new(hub: &TransportHub, id: u16, peers: Vec<u16>) -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let hard_state = HardState::open(state_dir.path().join("hard.state")).unwrap();
        let agent = Arc::new(Mutex::new(ClusterAgent::new(
            ClusterConfig::new(id, peers),
            hub.register(id),
            hard_state,
            GatewayCounters::new(),
            0,
        )));
        let streams = ClusterableStreams::clustered(agent.clone());
        Self {
            id,
            agent,
            streams,
            hub: hub.clone(),
            _state_dir: state_dir,
        }
    }

    fn poll(&self, now_ms: u64) {
        self.agent.lock().poll(now_ms);
    }

    fn is_leader(&self) -> bool {
        self.agent.lock().is_leader()
    }

    fn is_follower(&self) -> bool {
        self.agent.lock().is_follower()
    }

    fn is_candidate(&self) -> bool {
        self.agent.lock().is_candidate()
    }

    fn leader_session_id(&self) -> u64 {
        self.agent.lock().leader_session_id()
    }

    fn replicated_position(&self) -> u64 {
        self.agent.lock().replicated_position()
    }

    fn drop_frames(&self, inbound: bool, outbound: bool) {
        self.hub.drop_frames(self.id, inbound, outbound);
    }
}

struct Cluster {
    nodes: Vec<NodeRunner>,
    now_ms: u64,
}

impl Cluster {
    fn start() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let hub = TransportHub::new();
        let nodes = vec![
            NodeRunner::new(&hub, 1, vec![2, 3]),
            NodeRunner::new(&hub, 2, vec![1, 3]),
            NodeRunner::new(&hub, 3, vec![1, 2]),
        ];
        let mut cluster = Self { nodes, now_ms: 0 };
        cluster.await_leader();
        cluster
    }

    fn poll_all(&mut self) {
        for node in &self.nodes {
            node.poll(self.now_ms);
        }
        self.now_ms += 1;
    }

    fn until(&mut self, what: &str, condition: impl Fn(&[NodeRunner]) -> bool) {
        let deadline = self.now_ms + TIMEOUT_ROUNDS;
        while !condition(&self.nodes) {
            assert!(self.now_ms < deadline, "timed out waiting for: {what}");
            self.poll_all();
        }
    }

    fn await_leader(&mut self) {
        self.until("a single leader", |nodes| {
            nodes.iter().filter(|node| node.is_leader()).count() == 1
        });
    }

    fn leader_index(&self) -> usize {
        self.nodes.iter().position(|node| node.is_leader()).unwrap()
    }

    fn follower_indices(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.is_leader())
            .map(|(i, _)| i)
            .collect()
    }

    fn one_leader_two_followers(nodes: &[NodeRunner]) -> bool {
        let leaders = nodes.iter().filter(|node| node.is_leader()).count();
        let followers = nodes.iter().filter(|node| node.is_follower()).count();
        leaders == 1 && followers == 2
    }

    fn publish_from(&mut self, leader: usize) -> i64 {
        let publication = self.nodes[leader].streams.publication(SessionId::new(1));
        let deadline = self.now_ms + TIMEOUT_ROUNDS;
        loop {
            let position = publication.try_claim(PAYLOAD);
            if position > 0 {
                return position;
            }
            assert!(self.now_ms < deadline, "claim never succeeded");
            self.poll_all();
        }
    }
}

#[test]
fn cluster_forms_with_agreed_leader() {
    let mut cluster = Cluster::start();
    cluster.until("stable roles", Cluster::one_leader_two_followers);

    cluster.until("leader session id agreement", |nodes| {
        let id = nodes[0].leader_session_id();
        id != 0 && nodes.iter().all(|node| node.leader_session_id() == id)
    });
}

#[test]
fn replicates_a_payload_to_every_node() {
    let mut cluster = Cluster::start();
    let leader = cluster.leader_index();

    let position = cluster.publish_from(leader);
    assert_eq!(position as u64, POSITION_AFTER_MESSAGE);

    cluster.until("replication to all nodes", |nodes| {
        nodes
            .iter()
            .all(|node| node.replicated_position() >= POSITION_AFTER_MESSAGE)
    });
}

#[test]
fn reforms_after_leader_full_netsplit() {
    let mut cluster = Cluster::start();
    let old_leader = cluster.leader_index();
    let followers = cluster.follower_indices();

    cluster.nodes[old_leader].drop_frames(true, true);

    cluster.until("followers elect a new leader", |nodes| {
        nodes
            .iter()
            .enumerate()
            .filter(|&(i, node)| i != old_leader && node.is_leader())
            .count()
            == 1
    });
    assert!(followers.iter().any(|&i| cluster.nodes[i].is_leader()));

    cluster.nodes[old_leader].drop_frames(false, false);

    cluster.until("old leader steps down", |nodes| {
        nodes[old_leader].is_follower()
    });
    cluster.until("stable roles", Cluster::one_leader_two_followers);
}

#[test]
fn reforms_after_partial_leader_netsplit_outbound_only() {
    let mut cluster = Cluster::start();
    let old_leader = cluster.leader_index();

    // Only the leader's outbound frames are lost. Its inbound side still
    // hears the new election but stickiness keeps it leading until the new
    // leader's higher term arrives.
    cluster.nodes[old_leader].drop_frames(false, true);

    cluster.until("followers elect a new leader", |nodes| {
        nodes
            .iter()
            .enumerate()
            .filter(|&(i, node)| i != old_leader && node.is_leader())
            .count()
            == 1
    });

    cluster.until("old leader steps down", |nodes| {
        nodes[old_leader].is_follower()
    });

    cluster.nodes[old_leader].drop_frames(false, false);
    cluster.until("stable roles", Cluster::one_leader_two_followers);
}

#[test]
fn follower_full_netsplit_rejoins() {
    let mut cluster = Cluster::start();
    let leader = cluster.leader_index();
    let partitioned = cluster.follower_indices()[0];

    cluster.nodes[partitioned].drop_frames(true, true);

    cluster.until("partitioned follower becomes candidate", |nodes| {
        nodes[partitioned].is_candidate()
    });

    // Its minority elections fail; the rest of the cluster keeps its leader.
    assert!(cluster.nodes[leader].is_leader());

    cluster.nodes[partitioned].drop_frames(false, false);

    cluster.until("candidacy resolves", |nodes| {
        !nodes[partitioned].is_candidate()
    });
    cluster.until("stable roles", Cluster::one_leader_two_followers);
}

#[test]
fn follower_inbound_only_netsplit_rejoins() {
    let mut cluster = Cluster::start();
    let leader = cluster.leader_index();
    let partitioned = cluster.follower_indices()[0];

    // It stops hearing heartbeats and campaigns, but its RequestVotes ARE
    // delivered; peers with a live leader reject them without adopting the
    // term, so the leader survives the whole partition.
    cluster.nodes[partitioned].drop_frames(true, false);

    cluster.until("partitioned follower becomes candidate", |nodes| {
        nodes[partitioned].is_candidate()
    });
    assert!(cluster.nodes[leader].is_leader());

    for _ in 0..1_000 {
        cluster.poll_all();
    }
    assert!(cluster.nodes[leader].is_leader());

    cluster.nodes[partitioned].drop_frames(false, false);

    cluster.until("candidacy resolves", |nodes| {
        !nodes[partitioned].is_candidate()
    });
    cluster.until("stable roles", Cluster::one_leader_two_followers);
}

#[test]
fn follower_outbound_only_netsplit_stays_follower() {
    let mut cluster = Cluster::start();
    let partitioned = cluster.follower_indices()[0];

    // It still hears heartbeats, so it never times out.
    cluster.nodes[partitioned].drop_frames(false, true);

    for _ in 0..2_000 {
        cluster.poll_all();
    }
    assert!(cluster.nodes[partitioned].is_follower());

    cluster.nodes[partitioned].drop_frames(false, false);
    cluster.until("stable roles", Cluster::one_leader_two_followers);
}

#[test]
fn no_progress_on_partitioned_follower_until_heal() {
    let mut cluster = Cluster::start();
    let leader = cluster.leader_index();
    let partitioned = cluster.follower_indices()[0];
    let connected = cluster.follower_indices()[1];

    cluster.nodes[partitioned].drop_frames(true, true);
    cluster.until("partitioned follower becomes candidate", |nodes| {
        nodes[partitioned].is_candidate()
    });

    // The remaining majority commits the payload.
    cluster.publish_from(leader);
    cluster.until("majority replication", move |nodes| {
        nodes[leader].replicated_position() >= POSITION_AFTER_MESSAGE
            && nodes[connected].replicated_position() >= POSITION_AFTER_MESSAGE
    });

    // The partitioned node saw none of it.
    assert!(cluster.nodes[partitioned].replicated_position() < POSITION_AFTER_MESSAGE);

    cluster.nodes[partitioned].drop_frames(false, false);

    cluster.until("partitioned follower catches up", |nodes| {
        nodes[partitioned].replicated_position() >= POSITION_AFTER_MESSAGE
    });
    cluster.until("stable roles", Cluster::one_leader_two_followers);
}

#[test]
fn committed_entries_survive_leadership_change() {
    let mut cluster = Cluster::start();
    let first_leader = cluster.leader_index();

    cluster.publish_from(first_leader);
    cluster.until("replication to all nodes", |nodes| {
        nodes
            .iter()
            .all(|node| node.replicated_position() >= POSITION_AFTER_MESSAGE)
    });

    // Depose the leader; leader completeness says the entry survives.
    cluster.nodes[first_leader].drop_frames(true, true);
    cluster.until("new leader", |nodes| {
        nodes
            .iter()
            .enumerate()
            .filter(|&(i, node)| i != first_leader && node.is_leader())
            .count()
            == 1
    });
    cluster.nodes[first_leader].drop_frames(false, false);
    cluster.until("stable roles", Cluster::one_leader_two_followers);

    let new_leader = cluster.leader_index();
    let position = cluster.publish_from(new_leader);
    assert!(position as u64 >= 2 * POSITION_AFTER_MESSAGE);

    cluster.until("second payload replicates", |nodes| {
        nodes
            .iter()
            .all(|node| node.replicated_position() >= 2 * POSITION_AFTER_MESSAGE)
    });
}
