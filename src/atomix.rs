//! The composition root (C10): the `Atomix` facade and its builder.
//!
//! All lifecycle transitions are serialized here on whatever single task
//! calls `open()`/`close()` — not a performance choice, but what makes the
//! open/close state machine easy to reason about and rules out races
//! between a partial open and a concurrent close.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::instrument;

pub use crate::config::AtomixBuilder;
use crate::config::AtomixConfig;
use crate::communication::ClusterCommunicationService;
use crate::error::AtomixError;
use crate::error::AtomixResult;
use crate::events::ClusterEventService;
use crate::lifecycle::Lifecycle;
use crate::membership::ClusterMembership;
use crate::node::NodeId;
use crate::partition::ParticipantFactory;
use crate::partition::PartitionService;
use crate::primitives::PrimitiveService;
use crate::topology::PartitionTopology;
use crate::transport::ClusterTransport;
use crate::AppPayload;

/// The top-level facade: wires membership, the communication/event fabrics,
/// the partition service, and the primitive factory into one ordered
/// bring-up/teardown unit.
pub struct Atomix<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    local: NodeId,
    membership: Arc<ClusterMembership>,
    communication: Arc<ClusterCommunicationService>,
    events: Arc<ClusterEventService>,
    partitions: Arc<PartitionService<D, R>>,
    primitives: Arc<PrimitiveService>,
    topology: Arc<PartitionTopology>,
    open: AtomicBool,
}

impl<D, R> Atomix<D, R>
where
    D: AppPayload,
    R: AppPayload,
{
    /// Assemble (without opening) a runtime from validated configuration, a
    /// caller-supplied transport, and a caller-supplied Raft participant
    /// factory. Transport bring-up is the caller's responsibility and
    /// happens before this call — it is an external collaborator, not one
    /// of the lifecycle steps this root drives (the driven sequence begins
    /// at membership; see `ordered_components`).
    pub fn assemble(config: &AtomixConfig, transport: Arc<dyn ClusterTransport>, participant_factory: &dyn ParticipantFactory<D, R>) -> AtomixResult<Self> {
        let topology = Arc::new(config.topology()?);
        let membership = Arc::new(ClusterMembership::new(&config.cluster_metadata()));
        let communication = Arc::new(ClusterCommunicationService::new(transport, membership.clone()));
        let events = Arc::new(ClusterEventService::new());
        let partitions = Arc::new(PartitionService::new(&topology, &config.local_node.id, &config.data_dir, participant_factory)?);
        let primitives = Arc::new(PrimitiveService::new(config.primitive_types.clone(), topology.clone()));

        Ok(Self {
            local: config.local_node.id.clone(),
            membership,
            communication,
            events,
            partitions,
            primitives,
            topology,
            open: AtomicBool::new(false),
        })
    }

    pub fn local_node(&self) -> &NodeId {
        &self.local
    }

    pub fn topology(&self) -> &PartitionTopology {
        &self.topology
    }

    pub fn membership(&self) -> &Arc<ClusterMembership> {
        &self.membership
    }

    pub fn communication(&self) -> &Arc<ClusterCommunicationService> {
        &self.communication
    }

    pub fn events(&self) -> &Arc<ClusterEventService> {
        &self.events
    }

    pub fn partitions(&self) -> &Arc<PartitionService<D, R>> {
        &self.partitions
    }

    /// The primitive-service surface exposed to the user, gated on `open()`.
    pub fn primitive_service(&self) -> AtomixResult<&Arc<PrimitiveService>> {
        if !self.is_open() {
            return Err(AtomixError::NotOpen);
        }
        Ok(&self.primitives)
    }

    fn ordered_components(&self) -> [&(dyn Lifecycle); 4] {
        [self.membership.as_ref(), self.communication.as_ref(), self.events.as_ref(), self.partitions.as_ref()]
    }

    /// Opens membership, communication, events, and the partition service in
    /// that order; registers the primitive service last and flips `open`.
    /// On any step's failure, every already-opened step is closed in
    /// reverse order before the error surfaces.
    #[instrument(skip(self), fields(node = %self.local))]
    pub async fn open(&self) -> AtomixResult<()> {
        if self.is_open() {
            return Ok(());
        }

        let mut opened: Vec<&dyn Lifecycle> = Vec::new();
        for component in self.ordered_components().iter().copied() {
            match component.open().await {
                Ok(()) => opened.push(component),
                Err(e) => {
                    tracing::warn!(component = component.name(), error = %e, "open step failed, unwinding");
                    for already in opened.into_iter().rev() {
                        if let Err(close_err) = already.close().await {
                            tracing::warn!(component = already.name(), error = %close_err, "close during unwind failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        self.primitives.open().await?;
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Closes every component in exact reverse of open order. Idempotent:
    /// calling `close()` on an already-closed root succeeds. Component
    /// close errors are logged but never prevent completion.
    #[instrument(skip(self), fields(node = %self.local))]
    pub async fn close(&self) -> AtomixResult<()> {
        if let Err(e) = self.primitives.close().await {
            tracing::warn!(error = %e, "primitive service close failed");
        }

        for component in self.ordered_components().iter().copied().rev() {
            if let Err(e) = component.close().await {
                tracing::warn!(component = component.name(), error = %e, "close step failed");
            }
        }

        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Endpoint;
    use crate::node::Node;
    use crate::raft_participant::ReadConsistency;
    use crate::topology::PartitionMetadata;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct RecordingTransport;

    #[async_trait]
    impl ClusterTransport for RecordingTransport {
        async fn send(&self, _endpoint: &Endpoint, _topic: &str, _body: Vec<u8>) -> AtomixResult<Vec<u8>> {
            Ok(Vec::new())
        }
        fn subscribe(&self, _topic: &str, _handler: Box<dyn crate::transport::MessageHandler>) {}
    }

    struct NoopParticipant;

    #[async_trait]
    impl crate::raft_participant::RaftParticipant<String, String> for NoopParticipant {
        async fn open_session(&self, _client_id: &str) -> AtomixResult<u64> {
            Ok(1)
        }
        async fn submit(&self, _session: u64, _sequence: u64, _command: String) -> AtomixResult<String> {
            Ok(String::new())
        }
        async fn query(&self, _session: u64, _level: ReadConsistency, _query: String) -> AtomixResult<String> {
            Ok(String::new())
        }
        async fn keepalive(&self, _session: u64) -> AtomixResult<()> {
            Ok(())
        }
        async fn close_session(&self, _session: u64) -> AtomixResult<()> {
            Ok(())
        }
    }

    struct NoopFactory;

    impl ParticipantFactory<String, String> for NoopFactory {
        fn build(&self, _partition: &PartitionMetadata, _data_dir: &PathBuf) -> AtomixResult<Arc<dyn crate::raft_participant::RaftParticipant<String, String>>> {
            Ok(Arc::new(NoopParticipant))
        }
    }

    fn local() -> Node {
        Node::new("n1", Endpoint::new("127.0.0.1", 1111))
    }

    fn config() -> AtomixConfig {
        AtomixBuilder::new()
            .local_node(local())
            .bootstrap_nodes(vec![local()])
            .data_dir(PathBuf::from("/tmp/atomix-root-test"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn open_then_primitive_service_is_accessible() {
        let cfg = config();
        let atomix = Atomix::<String, String>::assemble(&cfg, Arc::new(RecordingTransport), &NoopFactory).unwrap();
        assert!(matches!(atomix.primitive_service(), Err(AtomixError::NotOpen)));
        atomix.open().await.unwrap();
        assert!(atomix.primitive_service().is_ok());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let cfg = config();
        let atomix = Atomix::<String, String>::assemble(&cfg, Arc::new(RecordingTransport), &NoopFactory).unwrap();
        atomix.open().await.unwrap();
        atomix.close().await.unwrap();
        atomix.close().await.unwrap();
        assert!(!atomix.is_open());
    }

    #[tokio::test]
    async fn open_order_is_membership_communication_events_partitions() {
        let cfg = config();
        let atomix = Atomix::<String, String>::assemble(&cfg, Arc::new(RecordingTransport), &NoopFactory).unwrap();

        // The components' own `open()` calls cannot be intercepted without
        // changing their type, so this asserts the documented call order
        // directly against `ordered_components()` instead of instrumenting
        // each component.
        let names: Vec<&str> = atomix.ordered_components().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["cluster-membership", "cluster-communication", "cluster-events", "partition-service"]);
    }
}
