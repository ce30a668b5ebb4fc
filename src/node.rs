//! Node identity and cluster bootstrap metadata.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// An opaque, totally-orderable node identifier.
///
/// Ordering on `NodeId` is what makes partition topology synthesis
/// deterministic across nodes without coordination (see
/// [`crate::topology`]): every node sorts the bootstrap set the same way.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The role a node plays in the cluster. Present for forward compatibility
/// with heterogeneous deployments; the core itself treats all roles
/// uniformly when building topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Member,
    Client,
}

impl Default for NodeRole {
    fn default() -> Self {
        NodeRole::Member
    }
}

/// A node's network endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A cluster node. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub endpoint: Endpoint,
    pub role: NodeRole,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, endpoint: Endpoint) -> Self {
        Self {
            id: id.into(),
            endpoint,
            role: NodeRole::Member,
        }
    }
}

/// The local node plus the bootstrap node set, fixed at build time.
#[derive(Clone, Debug)]
pub struct ClusterMetadata {
    local: Node,
    bootstrap: BTreeSet<Node>,
}

// `Node` needs a total order to live in a `BTreeSet`; delegate to `NodeId`,
// which is the only field topology synthesis cares about for ordering.
impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl ClusterMetadata {
    pub fn new(local: Node, bootstrap: BTreeSet<Node>) -> Self {
        Self { local, bootstrap }
    }

    pub fn local_node(&self) -> &Node {
        &self.local
    }

    pub fn bootstrap_nodes(&self) -> &BTreeSet<Node> {
        &self.bootstrap
    }

    pub fn bootstrap_ids(&self) -> BTreeSet<NodeId> {
        self.bootstrap.iter().map(|n| n.id.clone()).collect()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.bootstrap.iter().any(|n| &n.id == id) || &self.local.id == id
    }
}
