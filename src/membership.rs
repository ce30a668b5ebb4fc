//! Cluster membership (C2): tracks the node set, liveness, and local
//! identity.
//!
//! Readers observe a consistent snapshot without locking: membership is a
//! value, published via `tokio::sync::watch` and replaced wholesale on
//! change, never mutated in place.

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AtomixResult;
use crate::lifecycle::Lifecycle;
use crate::node::ClusterMetadata;
use crate::node::Node;
use crate::node::NodeId;

/// A point-in-time view of the cluster's node set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MembershipSnapshot {
    pub members: BTreeSet<Node>,
}

impl MembershipSnapshot {
    pub fn is_member(&self, id: &NodeId) -> bool {
        self.members.iter().any(|n| &n.id == id)
    }
}

/// The cluster membership service.
pub struct ClusterMembership {
    local: Node,
    tx: watch::Sender<MembershipSnapshot>,
    rx: watch::Receiver<MembershipSnapshot>,
    open: AtomicBool,
}

impl ClusterMembership {
    pub fn new(metadata: &ClusterMetadata) -> Self {
        let initial = MembershipSnapshot {
            members: metadata.bootstrap_nodes().clone(),
        };
        let (tx, rx) = watch::channel(initial);
        Self {
            local: metadata.local_node().clone(),
            tx,
            rx,
            open: AtomicBool::new(false),
        }
    }

    pub fn local_node(&self) -> &Node {
        &self.local
    }

    /// A cheap, lock-free handle to the current and all future snapshots.
    pub fn subscribe(&self) -> watch::Receiver<MembershipSnapshot> {
        self.rx.clone()
    }

    /// The current snapshot, without subscribing to future changes.
    pub fn current(&self) -> MembershipSnapshot {
        self.rx.borrow().clone()
    }

    /// Replace the membership snapshot wholesale. Called when the
    /// partition service or an external discovery mechanism observes a
    /// change in liveness or node set.
    #[tracing::instrument(skip(self, snapshot), fields(members = snapshot.members.len()))]
    pub fn update(&self, snapshot: MembershipSnapshot) {
        let _ = self.tx.send(snapshot);
    }
}

#[async_trait]
impl Lifecycle for ClusterMembership {
    #[tracing::instrument(skip(self), fields(node = %self.local.id))]
    async fn open(&self) -> AtomixResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> AtomixResult<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cluster-membership"
    }
}
