//! Seed scenario 1: deterministic topology over a small bootstrap set.

mod fixtures;

use std::collections::BTreeSet;

use atomix_core::topology::PartitionId;
use atomix_core::topology::TopologyBuilder;
use atomix_core::NodeId;
use pretty_assertions::assert_eq;

#[test]
fn deterministic_topology_three_node_bootstrap() {
    fixtures::init_tracing();

    let bootstrap: BTreeSet<NodeId> = vec![NodeId::new("n1"), NodeId::new("n2"), NodeId::new("n3")].into_iter().collect();

    let topology = TopologyBuilder::new(0, 0).build(&bootstrap).unwrap();

    let expect = |members: &[&str]| -> BTreeSet<NodeId> { members.iter().map(|n| NodeId::new(*n)).collect() };

    assert_eq!(topology.partition(PartitionId(1)).unwrap().members, expect(&["n1", "n2", "n3"]));
    assert_eq!(topology.partition(PartitionId(2)).unwrap().members, expect(&["n2", "n3", "n1"]));
    assert_eq!(topology.partition(PartitionId(3)).unwrap().members, expect(&["n3", "n1", "n2"]));
}
