//! Partition topology synthesis (C5): deterministically mapping a bootstrap
//! node set to a set of replica groups.
//!
//! The sliding-window assignment below is the one piece of this crate with
//! the most "why does it look like this" surface, so the rationale lives
//! here rather than being scattered across call sites: it is cache-free,
//! deterministic across nodes without any coordination round-trip, and
//! produces a balanced replica graph without a central allocator.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::TopologyError;
use crate::node::NodeId;

/// A dense, 1-based partition identifier in `[1, N]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartitionId(pub u64);

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One partition's replica set.
///
/// Invariants (checked by [`TopologyBuilder::build`], not re-checked here):
/// the set is non-empty, its size is the replication factor, and every
/// member is drawn from the cluster's bootstrap set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMetadata {
    pub id: PartitionId,
    pub members: BTreeSet<NodeId>,
}

impl PartitionMetadata {
    pub fn new(id: PartitionId, members: BTreeSet<NodeId>) -> Self {
        Self { id, members }
    }

    pub fn replication_factor(&self) -> usize {
        self.members.len()
    }
}

/// The full partition-to-replica-set mapping for a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTopology {
    partitions: Vec<PartitionMetadata>,
}

impl PartitionTopology {
    pub fn from_explicit(partitions: Vec<PartitionMetadata>) -> Self {
        Self { partitions }
    }

    /// Partitions, ordered by id.
    pub fn partitions(&self) -> &[PartitionMetadata] {
        &self.partitions
    }

    pub fn partition(&self, id: PartitionId) -> Option<&PartitionMetadata> {
        self.partitions.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Every partition a given node hosts a replica of.
    pub fn partitions_for_node<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a PartitionMetadata> {
        self.partitions.iter().filter(move |p| p.members.contains(node))
    }
}

/// Derives a [`PartitionTopology`] from a cluster's bootstrap membership.
pub struct TopologyBuilder {
    num_partitions: u64,
    partition_size: usize,
}

impl TopologyBuilder {
    /// `num_partitions = 0` defaults to `bootstrap.len()`;
    /// `partition_size = 0` defaults to `min(bootstrap.len(), 3)`.
    pub fn new(num_partitions: u64, partition_size: usize) -> Self {
        Self { num_partitions, partition_size }
    }

    /// Build a topology for the given bootstrap node set.
    ///
    /// `B` is sorted by `NodeId` ascending first, so the same `(B, N, R)`
    /// triple produces an identical topology regardless of which node in
    /// the cluster computes it — no node needs to ask any other node what
    /// it computed.
    pub fn build(&self, bootstrap: &BTreeSet<NodeId>) -> Result<PartitionTopology, TopologyError> {
        if bootstrap.is_empty() {
            return Err(TopologyError::EmptyBootstrap);
        }

        let b = bootstrap.len();
        let n = if self.num_partitions == 0 { b as u64 } else { self.num_partitions };
        let r = if self.partition_size == 0 { b.min(3) } else { self.partition_size };

        if n == 0 {
            return Err(TopologyError::ZeroPartitions);
        }
        if r > b {
            return Err(TopologyError::PartitionSizeExceedsBootstrap { size: r, bootstrap: b });
        }

        // `B` is already sorted: it is a `BTreeSet<NodeId>`.
        let sorted: Vec<&NodeId> = bootstrap.iter().collect();

        let mut partitions = Vec::with_capacity(n as usize);
        for i in 0..n {
            let mut members = BTreeSet::new();
            for j in 0..r {
                let idx = (i as usize + j) % n as usize;
                // `idx` is reduced modulo `n`, which may exceed `sorted.len()`
                // when `n > b`; wrap into the sorted bootstrap set too.
                members.insert(sorted[idx % b].clone());
            }
            partitions.push(PartitionMetadata::new(PartitionId(i + 1), members));
        }

        Ok(PartitionTopology::from_explicit(partitions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> BTreeSet<NodeId> {
        names.iter().map(|n| NodeId::new(*n)).collect()
    }

    fn members(topology: &PartitionTopology, id: u64) -> BTreeSet<NodeId> {
        topology.partition(PartitionId(id)).unwrap().members.clone()
    }

    #[test]
    fn deterministic_topology_three_nodes() {
        let b = ids(&["n1", "n2", "n3"]);
        let topology = TopologyBuilder::new(0, 0).build(&b).unwrap();

        assert_eq!(topology.len(), 3);
        assert_eq!(members(&topology, 1), ids(&["n1", "n2", "n3"]));
        assert_eq!(members(&topology, 2), ids(&["n1", "n2", "n3"]));
        assert_eq!(members(&topology, 3), ids(&["n1", "n2", "n3"]));
    }

    #[test]
    fn same_replica_set_when_r_equals_b() {
        let b = ids(&["a", "b", "c"]);
        let topology = TopologyBuilder::new(3, 3).build(&b).unwrap();
        for p in topology.partitions() {
            assert_eq!(p.members, ids(&["a", "b", "c"]));
        }
    }

    #[test]
    fn sliding_window_five_nodes_three_replicas() {
        let b = ids(&["a", "b", "c", "d", "e"]);
        let topology = TopologyBuilder::new(5, 3).build(&b).unwrap();
        let sorted = ["a", "b", "c", "d", "e"];

        for i in 0..5u64 {
            let expect: BTreeSet<NodeId> = (0..3).map(|j| NodeId::new(sorted[((i + j) % 5) as usize])).collect();
            assert_eq!(members(&topology, i + 1), expect, "partition {}", i + 1);
        }
    }

    #[test]
    fn balance_property_every_node_in_exactly_r_partitions_when_n_equals_b() {
        let b = ids(&["a", "b", "c", "d", "e"]);
        let topology = TopologyBuilder::new(0, 2).build(&b).unwrap();
        for node in &b {
            let count = topology.partitions_for_node(node).count();
            assert_eq!(count, 2, "node {:?} should host exactly R partitions", node);
        }
    }

    #[test]
    fn coverage_property_every_node_appears_when_n_ge_b() {
        let b = ids(&["a", "b", "c"]);
        let topology = TopologyBuilder::new(9, 2).build(&b).unwrap();
        for node in &b {
            assert!(topology.partitions_for_node(node).count() >= 1);
        }
    }

    #[test]
    fn partition_size_greater_than_bootstrap_is_configuration_invalid() {
        let b = ids(&["a", "b", "c"]);
        let err = TopologyBuilder::new(0, 4).build(&b).unwrap_err();
        assert_eq!(err, TopologyError::PartitionSizeExceedsBootstrap { size: 4, bootstrap: 3 });
    }

    #[test]
    fn empty_bootstrap_is_configuration_invalid() {
        let b: BTreeSet<NodeId> = BTreeSet::new();
        let err = TopologyBuilder::new(0, 0).build(&b).unwrap_err();
        assert_eq!(err, TopologyError::EmptyBootstrap);
    }

    #[test]
    fn topology_is_pure_function_of_sorted_bootstrap() {
        let b1 = ids(&["z", "a", "m"]);
        let b2 = ids(&["a", "m", "z"]); // same set, different insertion order
        let t1 = TopologyBuilder::new(3, 2).build(&b1).unwrap();
        let t2 = TopologyBuilder::new(3, 2).build(&b2).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn explicit_topology_overrides_derivation() {
        let explicit = vec![PartitionMetadata::new(PartitionId(1), ids(&["only-one"]))];
        let topology = PartitionTopology::from_explicit(explicit.clone());
        assert_eq!(topology.partitions(), explicit.as_slice());
    }
}
