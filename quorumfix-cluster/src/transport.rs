/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-process cluster transport.
//!
//! A [`TransportHub`] is a switchboard of single-consumer inboxes, one per
//! node, standing in for the shared-memory transport. Frames are opaque
//! bytes; delivery is unordered across senders but ordered per sender.
//!
//! Fault injection mirrors the frame-drop model the cluster must tolerate:
//! each node has independent `drop_inbound` and `drop_outbound` flags, and a
//! frame is delivered only if the sender's outbound side and the receiver's
//! inbound side are both open. Setting `drop_inbound` also discards frames
//! already queued.

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::messages::NodeId;

#[derive(Debug)]
struct Link {
    tx: Sender<Bytes>,
    drop_inbound: Arc<AtomicBool>,
    drop_outbound: Arc<AtomicBool>,
}

/// Switchboard connecting cluster nodes in process.
#[derive(Debug, Clone, Default)]
pub struct TransportHub {
    links: Arc<Mutex<HashMap<NodeId, Link>>>,
}

impl TransportHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node and returns its transport endpoint.
    ///
    /// Re-registering an id replaces the previous endpoint.
    #[must_use]
    pub fn register(&self, node_id: NodeId) -> NodeTransport {
        let (tx, rx) = unbounded();
        let drop_inbound = Arc::new(AtomicBool::new(false));
        let drop_outbound = Arc::new(AtomicBool::new(false));

        self.links.lock().insert(
            node_id,
            Link {
                tx,
                drop_inbound: drop_inbound.clone(),
                drop_outbound: drop_outbound.clone(),
            },
        );

        NodeTransport {
            node_id,
            hub: self.clone(),
            rx,
            drop_inbound,
            drop_outbound,
        }
    }

    /// Sets the frame-drop flags for a node.
    pub fn drop_frames(&self, node_id: NodeId, inbound: bool, outbound: bool) {
        if let Some(link) = self.links.lock().get(&node_id) {
            link.drop_inbound.store(inbound, Ordering::SeqCst);
            link.drop_outbound.store(outbound, Ordering::SeqCst);
        }
    }

    fn deliver(&self, from: NodeId, to: NodeId, frame: Bytes) {
        let links = self.links.lock();
        let Some(sender) = links.get(&from) else {
            return;
        };
        if sender.drop_outbound.load(Ordering::SeqCst) {
            return;
        }
        let Some(receiver) = links.get(&to) else {
            return;
        };
        if receiver.drop_inbound.load(Ordering::SeqCst) {
            return;
        }
        let _ = receiver.tx.send(frame);
    }
}

/// One node's endpoint on the hub.
#[derive(Debug)]
pub struct NodeTransport {
    node_id: NodeId,
    hub: TransportHub,
    rx: Receiver<Bytes>,
    drop_inbound: Arc<AtomicBool>,
    drop_outbound: Arc<AtomicBool>,
}

impl NodeTransport {
    /// This endpoint's node id.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Sends one frame to a peer, subject to the drop flags.
    pub fn send(&self, to: NodeId, frame: Bytes) {
        self.hub.deliver(self.node_id, to, frame);
    }

    /// Sends one frame to every peer in `peers`.
    pub fn broadcast(&self, peers: &[NodeId], frame: &Bytes) {
        for &peer in peers {
            self.send(peer, frame.clone());
        }
    }

    /// Receives the next pending frame, if any.
    ///
    /// When `drop_inbound` is set, queued frames are discarded as well.
    #[must_use]
    pub fn try_recv(&self) -> Option<Bytes> {
        if self.drop_inbound.load(Ordering::SeqCst) {
            while self.rx.try_recv().is_ok() {}
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Sets both drop flags for this node.
    pub fn drop_frames(&self, inbound: bool, outbound: bool) {
        self.drop_inbound.store(inbound, Ordering::SeqCst);
        self.drop_outbound.store(outbound, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_to_point_delivery() {
        let hub = TransportHub::new();
        let a = hub.register(1);
        let b = hub.register(2);

        a.send(2, Bytes::from_static(b"ping"));
        assert_eq!(b.try_recv().unwrap().as_ref(), b"ping");
        assert!(b.try_recv().is_none());
        assert!(a.try_recv().is_none());
    }

    #[test]
    fn test_broadcast_skips_unknown_peers() {
        let hub = TransportHub::new();
        let a = hub.register(1);
        let b = hub.register(2);

        a.broadcast(&[2, 99], &Bytes::from_static(b"hello"));
        assert!(b.try_recv().is_some());
    }

    #[test]
    fn test_drop_outbound() {
        let hub = TransportHub::new();
        let a = hub.register(1);
        let b = hub.register(2);

        a.drop_frames(false, true);
        a.send(2, Bytes::from_static(b"lost"));
        assert!(b.try_recv().is_none());

        // Inbound to the dropped node still works.
        b.send(1, Bytes::from_static(b"heard"));
        assert!(a.try_recv().is_some());
    }

    #[test]
    fn test_drop_inbound_discards_queued_frames() {
        let hub = TransportHub::new();
        let a = hub.register(1);
        let b = hub.register(2);

        a.send(2, Bytes::from_static(b"queued"));
        b.drop_frames(true, false);
        assert!(b.try_recv().is_none());

        // Healing the partition does not resurrect discarded frames.
        b.drop_frames(false, false);
        assert!(b.try_recv().is_none());

        a.send(2, Bytes::from_static(b"fresh"));
        assert_eq!(b.try_recv().unwrap().as_ref(), b"fresh");
    }

    #[test]
    fn test_hub_level_drop_control() {
        let hub = TransportHub::new();
        let a = hub.register(1);
        let b = hub.register(2);

        hub.drop_frames(1, true, true);
        a.send(2, Bytes::from_static(b"lost"));
        assert!(b.try_recv().is_none());

        hub.drop_frames(1, false, false);
        a.send(2, Bytes::from_static(b"delivered"));
        assert!(b.try_recv().is_some());
    }
}
