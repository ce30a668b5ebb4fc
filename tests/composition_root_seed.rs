//! Seed scenario 2: bring-up/teardown ordering and the `NotOpen` invariant.
//!
//! The exact open order (membership -> communication -> events ->
//! partitions) is asserted at the unit level in `src/atomix.rs`, where the
//! ordered component list is directly inspectable; this test exercises the
//! black-box contract a caller actually observes.

mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use atomix_core::error::AtomixError;
use atomix_core::partition::ParticipantFactory;
use atomix_core::raft_participant::RaftParticipant;
use atomix_core::topology::PartitionMetadata;
use atomix_core::transport::ClusterTransport;
use atomix_core::transport::MessageHandler;
use atomix_core::{Atomix, AtomixBuilder, Node};
use atomix_core::node::Endpoint;

struct RecordingTransport;

#[async_trait]
impl ClusterTransport for RecordingTransport {
    async fn send(&self, _endpoint: &Endpoint, _topic: &str, _body: Vec<u8>) -> atomix_core::error::AtomixResult<Vec<u8>> {
        Ok(Vec::new())
    }
    fn subscribe(&self, _topic: &str, _handler: Box<dyn MessageHandler>) {}
}

struct StubFactory;

impl ParticipantFactory<String, String> for StubFactory {
    fn build(&self, _partition: &PartitionMetadata, _data_dir: &PathBuf) -> atomix_core::error::AtomixResult<Arc<dyn RaftParticipant<String, String>>> {
        Ok(Arc::new(fixtures::ScriptedParticipant::new(vec![])))
    }
}

fn local() -> Node {
    Node::new("n1", Endpoint::new("127.0.0.1", 1111))
}

#[tokio::test]
async fn primitive_service_rejects_until_open_then_close_is_idempotent() {
    fixtures::init_tracing();

    let config = AtomixBuilder::new()
        .local_node(local())
        .bootstrap_nodes(vec![local()])
        .data_dir(PathBuf::from("/tmp/atomix-composition-root-test"))
        .build()
        .unwrap();

    let atomix = Atomix::<String, String>::assemble(&config, Arc::new(RecordingTransport), &StubFactory).unwrap();

    assert!(matches!(atomix.primitive_service(), Err(AtomixError::NotOpen)));

    atomix.open().await.unwrap();
    assert!(atomix.primitive_service().is_ok());

    atomix.close().await.unwrap();
    assert!(matches!(atomix.primitive_service(), Err(AtomixError::NotOpen)));

    // Idempotent: closing an already-closed root still succeeds.
    atomix.close().await.unwrap();
}

#[tokio::test]
async fn open_releases_every_partition_handle_on_close() {
    let config = AtomixBuilder::new()
        .local_node(local())
        .bootstrap_nodes(vec![local()])
        .data_dir(PathBuf::from("/tmp/atomix-composition-root-test-2"))
        .build()
        .unwrap();

    let atomix = Atomix::<String, String>::assemble(&config, Arc::new(RecordingTransport), &StubFactory).unwrap();
    atomix.open().await.unwrap();
    assert!(atomix.partitions().partitions().iter().all(|p| p.is_open()));

    atomix.close().await.unwrap();
    assert!(atomix.partitions().partitions().iter().all(|p| !p.is_open()));
}
